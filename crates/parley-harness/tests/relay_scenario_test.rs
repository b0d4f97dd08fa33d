//! End-to-end relay scenarios over turmoil's simulated network.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parley_harness::{SimClient, SimEnv, SimServer};
use parley_proto::{LineEvent, Payload};
use parley_server::DriverConfig;

const ADDR: &str = "server:3001";

/// Long enough for earlier clients to connect under turmoil's default latency.
const SETTLE: Duration = Duration::from_millis(500);

fn serve(sim: &mut turmoil::Sim<'_>, idle_timeout: Duration) {
    sim.host("server", move || async move {
        let config = DriverConfig { idle_timeout, ..DriverConfig::default() };
        let server =
            SimServer::bind_with_config("0.0.0.0:3001", config, SimEnv::with_seed(7)).await?;
        server.run().await?;
        Ok(())
    });
}

#[test]
fn claim_chat_and_leave() {
    let mut sim = turmoil::Builder::new().build();
    serve(&mut sim, Duration::from_secs(60));

    sim.client("alice", async {
        let mut alice = SimClient::connect(ADDR).await?;
        assert!(alice.claim("alice").await?);

        let join = alice.recv_line().await?;
        assert!(matches!(&join, LineEvent::Join { user, .. } if user == "bob"));

        alice.say("hi").await?;

        // Give bob time to read before leaving
        tokio::time::sleep(Duration::from_millis(100)).await;
        alice.goodbye().await?;
        assert_eq!(alice.recv().await?, None);

        Ok(())
    });

    sim.client("bob", async {
        tokio::time::sleep(SETTLE).await;
        let mut bob = SimClient::connect(ADDR).await?;

        assert!(!bob.claim("alice").await?);
        assert!(bob.claim("bob").await?);

        let message = bob.recv_line().await?;
        assert_eq!(message, LineEvent::message(message.time(), "alice", "hi"));

        let quit = bob.recv_line().await?;
        assert!(matches!(&quit, LineEvent::Quit { user, .. } if user == "alice"));

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn anonymous_clients_hear_everything_but_cannot_speak() {
    let mut sim = turmoil::Builder::new().build();
    serve(&mut sim, Duration::from_secs(60));

    sim.client("lurker", async {
        let mut lurker = SimClient::connect(ADDR).await?;
        lurker.say("ignored").await?;

        let join = lurker.recv_line().await?;
        assert_eq!(join.user(), "alice");

        let message = lurker.recv_line().await?;
        assert!(matches!(&message, LineEvent::Message { text, .. } if text == "hello"));

        Ok(())
    });

    sim.client("alice", async {
        tokio::time::sleep(SETTLE).await;
        let mut alice = SimClient::connect(ADDR).await?;
        assert!(alice.claim("alice").await?);
        alice.say("hello").await?;

        // The lurker's message was dropped, so nothing arrives here
        let nothing = tokio::time::timeout(Duration::from_millis(200), alice.recv()).await;
        assert!(nothing.is_err());

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn idle_client_is_disconnected_after_timeout() {
    let mut sim = turmoil::Builder::new().build();
    serve(&mut sim, Duration::from_secs(2));

    sim.client("carol", async {
        let mut carol = SimClient::connect(ADDR).await?;
        tokio::time::sleep(SETTLE).await;
        assert!(carol.claim("carol").await?);

        // Stay silent; the relay closes the stream
        assert_eq!(carol.recv().await?, None);

        Ok(())
    });

    sim.client("observer", async {
        let mut observer = SimClient::connect(ADDR).await?;

        let join = observer.recv_line().await?;
        let quit = observer.recv_line().await?;
        assert_eq!(join.user(), "carol");
        assert!(matches!(quit, LineEvent::Quit { .. }));

        let idle = quit.time() - join.time();
        assert!((2000..2100).contains(&idle), "quit after {idle}ms");

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn speaking_postpones_the_timeout() {
    let mut sim = turmoil::Builder::new().build();
    serve(&mut sim, Duration::from_secs(2));

    sim.client("carol", async {
        let mut carol = SimClient::connect(ADDR).await?;
        tokio::time::sleep(SETTLE).await;
        assert!(carol.claim("carol").await?);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        carol.say("still here").await?;

        assert_eq!(carol.recv().await?, None);

        Ok(())
    });

    sim.client("observer", async {
        let mut observer = SimClient::connect(ADDR).await?;

        let join = observer.recv_line().await?;
        let message = observer.recv_line().await?;
        let quit = observer.recv_line().await?;

        assert!(matches!(message, LineEvent::Message { .. }));
        let idle = quit.time() - join.time();
        assert!((3500..3800).contains(&idle), "quit after {idle}ms");

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn simultaneous_claims_admit_exactly_one() {
    const CLIENTS: usize = 6;
    const HOLD: Duration = Duration::from_secs(5);

    let mut sim = turmoil::Builder::new().build();
    serve(&mut sim, Duration::from_secs(60));

    let accepted = Arc::new(AtomicUsize::new(0));
    let refused = Arc::new(AtomicUsize::new(0));

    for i in 0..CLIENTS {
        let accepted = Arc::clone(&accepted);
        let refused = Arc::clone(&refused);

        sim.client(format!("client{i}"), async move {
            let mut client = SimClient::connect(ADDR).await?;
            if client.claim("bob").await? {
                accepted.fetch_add(1, Ordering::SeqCst);
            } else {
                refused.fetch_add(1, Ordering::SeqCst);
            }

            // Hanging up would release the name to a later claim
            tokio::time::sleep(HOLD).await;
            Ok(())
        });
    }

    sim.run().expect("simulation failed");

    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert_eq!(refused.load(Ordering::SeqCst), CLIENTS - 1);
}

#[test]
fn released_name_can_be_claimed_again() {
    let mut sim = turmoil::Builder::new().build();
    serve(&mut sim, Duration::from_secs(60));

    sim.client("first", async {
        let mut first = SimClient::connect(ADDR).await?;
        assert!(first.claim("alice").await?);
        first.goodbye().await?;
        assert_eq!(first.recv().await?, None);
        Ok(())
    });

    sim.client("second", async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut second = SimClient::connect(ADDR).await?;
        assert!(second.claim("alice").await?);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn shutdown_notifies_connected_clients() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("server", || async {
        let server = SimServer::bind("0.0.0.0:3001").await?;
        server.run_until(tokio::time::sleep(Duration::from_secs(1))).await?;

        // Keep the host alive while clients drain
        std::future::pending::<()>().await;
        Ok(())
    });

    sim.client("alice", async {
        let mut alice = SimClient::connect(ADDR).await?;
        assert!(alice.claim("alice").await?);

        assert_eq!(alice.recv().await?, Some(Payload::ServerShuttingDown));
        assert_eq!(alice.recv().await?, None);

        Ok(())
    });

    sim.run().expect("simulation failed");
}

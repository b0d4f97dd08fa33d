//! Relay runtime.
//!
//! Drives a [`ServerDriver`] from real (or simulated) byte streams. Each
//! connection gets a reader loop in the caller's task and a writer task fed
//! by a bounded queue. A peer that stops reading loses frames once its queue
//! fills; one slot is always left for the close signal. One mutex guards the
//! driver together with the outbound queues, so actions are enqueued in
//! exactly the order the driver produced them and broadcasts reach every peer
//! in the same order.
//!
//! A single timer task sleeps until the earliest inactivity deadline and then
//! feeds [`ServerEvent::Tick`] to the driver. Every dispatched event wakes
//! the timer so a touched deadline is picked up without polling.

use std::{collections::HashMap, sync::Arc};

use parley_core::env::Environment;
use parley_proto::{Frame, read_frame, write_frame};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::{Mutex, Notify, mpsc},
    task::JoinHandle,
};

use crate::{
    driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent},
    error::ServerError,
};

/// Frames buffered per connection before further frames are dropped.
const PEER_QUEUE_CAPACITY: usize = 256;

/// Outbound queue entry for one connection.
enum Outbound {
    Frame(Frame),
    Close(String),
}

/// Handle for queueing frames to one connection's writer task.
struct Peer {
    outbound: mpsc::Sender<Outbound>,
}

impl Peer {
    /// Enqueue without waiting. Senders only run under the relay lock, so the
    /// capacity check cannot race another send.
    fn enqueue(&self, session_id: u64, outbound: Outbound) {
        if matches!(outbound, Outbound::Frame(_)) && self.outbound.capacity() <= 1 {
            tracing::debug!(session_id, "outbound queue full, dropping frame");
            return;
        }

        // Full only on a repeated close; closed means the reader is about to
        // report the hangup
        let _ = self.outbound.try_send(outbound);
    }
}

struct RelayState<E: Environment> {
    driver: ServerDriver<E>,
    peers: HashMap<u64, Peer>,
}

impl<E: Environment> RelayState<E> {
    fn queue(&self, session_id: u64, outbound: Outbound) {
        if let Some(peer) = self.peers.get(&session_id) {
            peer.enqueue(session_id, outbound);
        }
    }

    fn execute(&self, actions: Vec<ServerAction<E::Instant>>) {
        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, frame } => {
                    self.queue(session_id, Outbound::Frame(frame));
                },
                ServerAction::Broadcast { frame, exclude_session } => {
                    for session_id in self.driver.session_ids() {
                        if Some(session_id) != exclude_session {
                            self.queue(session_id, Outbound::Frame(frame.clone()));
                        }
                    }
                },
                ServerAction::CloseConnection { session_id, reason } => {
                    tracing::debug!(session_id, %reason, "closing connection");
                    self.queue(session_id, Outbound::Close(reason));
                },
                ServerAction::Log { level, message, .. } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }
}

/// Shared relay handle. Clones refer to the same relay.
pub struct Relay<E: Environment> {
    state: Arc<Mutex<RelayState<E>>>,
    timer: Arc<Notify>,
    env: E,
}

impl<E: Environment> Clone for Relay<E> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state), timer: Arc::clone(&self.timer), env: self.env.clone() }
    }
}

impl<E: Environment> Relay<E> {
    /// Create a relay with no connections.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the driver configuration is invalid
    pub fn new(env: E, config: DriverConfig) -> Result<Self, ServerError> {
        let driver = ServerDriver::new(env.clone(), config)?;

        Ok(Self {
            state: Arc::new(Mutex::new(RelayState { driver, peers: HashMap::new() })),
            timer: Arc::new(Notify::new()),
            env,
        })
    }

    /// Serve one connection until it closes.
    ///
    /// Returns once the peer hangs up, the stream fails, or the relay closes
    /// the connection (goodbye, idle timeout, shutdown). Buffered frames are
    /// flushed before a relay-initiated close.
    pub async fn serve_connection<R, W>(&self, mut reader: R, writer: W) -> u64
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(PEER_QUEUE_CAPACITY);
        let closed = Arc::new(Notify::new());

        let session_id = {
            let mut state = self.state.lock().await;
            let session_id = self.allocate_session_id(&state);
            state.peers.insert(session_id, Peer { outbound: tx });
            session_id
        };

        tokio::spawn(write_loop(session_id, writer, rx, Arc::clone(&closed)));

        self.dispatch(ServerEvent::ConnectionAccepted { session_id }).await;

        let reason = loop {
            tokio::select! {
                result = read_frame(&mut reader) => match result {
                    Ok(Some(frame)) => {
                        self.dispatch(ServerEvent::FrameReceived { session_id, frame }).await;
                    },
                    Ok(None) => break "peer closed".to_string(),
                    Err(e) => break format!("read failed: {e}"),
                },
                () = closed.notified() => break "closed by relay".to_string(),
            }
        };

        {
            let mut state = self.state.lock().await;
            // Dropping the sender lets the writer drain and exit
            state.peers.remove(&session_id);
        }

        self.dispatch(ServerEvent::ConnectionClosed { session_id, reason }).await;

        session_id
    }

    /// Run the inactivity timer forever.
    pub async fn run_timer(&self) {
        loop {
            let deadline = self.state.lock().await.driver.next_deadline();

            let Some(deadline) = deadline else {
                self.timer.notified().await;
                continue;
            };

            let now = self.env.now();
            if deadline > now {
                tokio::select! {
                    () = self.env.sleep(deadline - now) => {},
                    () = self.timer.notified() => continue,
                }
            }

            self.dispatch(ServerEvent::Tick).await;
        }
    }

    /// Spawn [`Relay::run_timer`] on the current runtime.
    pub fn spawn_timer(&self) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move { relay.run_timer().await })
    }

    /// Tell every connection the relay is stopping, then close them.
    ///
    /// Connections accepted afterwards are closed immediately.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;

        match state.driver.process_event(ServerEvent::Shutdown) {
            Ok(actions) => state.execute(actions),
            Err(e) => tracing::error!("shutdown failed: {}", e),
        }

        for (&session_id, peer) in &state.peers {
            peer.enqueue(session_id, Outbound::Close("server shutting down".to_string()));
        }

        drop(state);
        self.timer.notify_one();
    }

    /// Number of connections the driver currently tracks.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.driver.connection_count()
    }

    /// Number of claimed names.
    pub async fn identity_count(&self) -> usize {
        self.state.lock().await.driver.identity_count()
    }

    /// Session that owns a name, if any.
    pub async fn owner_of(&self, name: &str) -> Option<u64> {
        self.state.lock().await.driver.owner_of(name)
    }

    async fn dispatch(&self, event: ServerEvent) {
        let mut state = self.state.lock().await;

        match state.driver.process_event(event) {
            Ok(actions) => state.execute(actions),
            Err(e) => tracing::debug!("event dropped: {}", e),
        }

        drop(state);
        self.timer.notify_one();
    }

    fn allocate_session_id(&self, state: &RelayState<E>) -> u64 {
        loop {
            let candidate = self.env.random_u64();
            if candidate != 0 && !state.peers.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

async fn write_loop<W>(
    session_id: u64,
    mut writer: W,
    mut rx: mpsc::Receiver<Outbound>,
    closed: Arc<Notify>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Frame(frame) => {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    tracing::debug!(session_id, "write failed: {}", e);
                    break;
                }
            },
            Outbound::Close(reason) => {
                tracing::debug!(session_id, %reason, "writer closing");
                break;
            },
        }
    }

    let _ = writer.shutdown().await;
    closed.notify_one();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_harness::SimEnv;
    use parley_proto::{LineEvent, Payload};
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    use super::*;

    struct TestClient {
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
    }

    impl TestClient {
        async fn send(&mut self, payload: Payload) {
            write_frame(&mut self.writer, &payload.into_frame().unwrap()).await.unwrap();
        }

        async fn recv(&mut self) -> Option<Payload> {
            read_frame(&mut self.reader)
                .await
                .unwrap()
                .map(|frame| Payload::from_frame(&frame).unwrap())
        }
    }

    fn connect(relay: &Relay<SimEnv>) -> TestClient {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_reader, server_writer) = tokio::io::split(server);
        let relay = relay.clone();
        tokio::spawn(async move { relay.serve_connection(server_reader, server_writer).await });

        let (reader, writer) = tokio::io::split(client);
        TestClient { reader, writer }
    }

    fn relay(idle_timeout: Duration) -> Relay<SimEnv> {
        let config = DriverConfig { idle_timeout, ..DriverConfig::default() };
        Relay::new(SimEnv::with_seed(7), config).unwrap()
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn claim_and_message_reach_other_clients() {
        let relay = relay(Duration::from_secs(60));
        let mut alice = connect(&relay);
        let mut bob = connect(&relay);
        settle().await;

        alice.send(Payload::ClaimName("alice".to_string())).await;
        assert_eq!(alice.recv().await, Some(Payload::ClaimAccepted));
        let Some(Payload::Line(join)) = bob.recv().await else { panic!("expected join") };
        assert_eq!(join, LineEvent::Join { time: join.time(), user: "alice".to_string() });

        alice.send(Payload::SendMessage("hi".to_string())).await;
        let Some(Payload::Line(line)) = bob.recv().await else { panic!("expected message") };
        assert_eq!(line, LineEvent::message(line.time(), "alice", "hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_claims_admit_exactly_one() {
        let relay = relay(Duration::from_secs(60));
        let mut clients: Vec<TestClient> = (0..8).map(|_| connect(&relay)).collect();
        settle().await;

        for client in &mut clients {
            client.send(Payload::ClaimName("bob".to_string())).await;
        }

        let mut accepted = 0;
        for client in &mut clients {
            loop {
                match client.recv().await {
                    Some(Payload::ClaimAccepted) => {
                        accepted += 1;
                        break;
                    },
                    Some(Payload::NameUnavailable) => break,
                    Some(Payload::Line(_)) => {},
                    other => panic!("unexpected reply: {other:?}"),
                }
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(relay.identity_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_client_is_disconnected() {
        let relay = relay(Duration::from_secs(2));
        let _timer = relay.spawn_timer();
        let mut carol = connect(&relay);
        let mut dave = connect(&relay);
        settle().await;

        carol.send(Payload::ClaimName("carol".to_string())).await;
        assert_eq!(carol.recv().await, Some(Payload::ClaimAccepted));
        let Some(Payload::Line(LineEvent::Join { .. })) = dave.recv().await else {
            panic!("expected join")
        };

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(carol.recv().await, None);
        let Some(Payload::Line(quit)) = dave.recv().await else { panic!("expected quit") };
        assert_eq!(quit, LineEvent::Quit { time: quit.time(), user: "carol".to_string() });
        assert_eq!(relay.owner_of("carol").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn hangup_releases_name() {
        let relay = relay(Duration::from_secs(60));
        let mut alice = connect(&relay);
        let mut bob = connect(&relay);
        settle().await;

        alice.send(Payload::ClaimName("alice".to_string())).await;
        assert_eq!(alice.recv().await, Some(Payload::ClaimAccepted));
        let _join = bob.recv().await;

        drop(alice);

        let Some(Payload::Line(quit)) = bob.recv().await else { panic!("expected quit") };
        assert_eq!(quit.user(), "alice");

        bob.send(Payload::ClaimName("alice".to_string())).await;
        assert_eq!(bob.recv().await, Some(Payload::ClaimAccepted));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_reader_loses_frames_beyond_its_queue() {
        const SENT: usize = PEER_QUEUE_CAPACITY * 4;

        let relay = relay(Duration::from_secs(60));
        let mut alice = connect(&relay);

        // Bob's pipe holds less than one message frame and he does not read
        let (bob_end, server) = tokio::io::duplex(1024);
        let (server_reader, server_writer) = tokio::io::split(server);
        let bob_relay = relay.clone();
        tokio::spawn(async move { bob_relay.serve_connection(server_reader, server_writer).await });
        let (mut bob_reader, _bob_writer) = tokio::io::split(bob_end);
        settle().await;

        alice.send(Payload::ClaimName("alice".to_string())).await;
        assert_eq!(alice.recv().await, Some(Payload::ClaimAccepted));

        let text = "x".repeat(512);
        for _ in 0..SENT {
            alice.send(Payload::SendMessage(text.clone())).await;
        }

        // The refusal is answered only after every message was processed
        alice.send(Payload::ClaimName("alice".to_string())).await;
        assert_eq!(alice.recv().await, Some(Payload::NameUnavailable));

        let mut received = 0;
        while let Ok(Ok(Some(_))) =
            tokio::time::timeout(Duration::from_secs(1), read_frame(&mut bob_reader)).await
        {
            received += 1;
        }

        // Queue slots plus the frame in flight and the join
        assert!(received <= PEER_QUEUE_CAPACITY + 2, "received {received} frames");
        assert!(received < SENT);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_notifies_and_closes() {
        let relay = relay(Duration::from_secs(60));
        let mut alice = connect(&relay);
        settle().await;

        relay.shutdown().await;

        assert_eq!(alice.recv().await, Some(Payload::ServerShuttingDown));
        assert_eq!(alice.recv().await, None);
    }
}

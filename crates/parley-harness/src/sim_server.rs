//! Simulation server for testing with turmoil.
//!
//! `SimServer` runs the same [`Relay`] the production server uses, over
//! turmoil's deterministic TCP instead of QUIC. Each accepted stream is
//! split and handed to [`Relay::serve_connection`] on its own task.

use std::{future::Future, io};

use parley_server::{DriverConfig, Relay};
use turmoil::net::TcpListener;

use crate::SimEnv;

/// Relay bound to a turmoil TCP listener.
pub struct SimServer {
    relay: Relay<SimEnv>,
    listener: TcpListener,
}

impl SimServer {
    /// Create and bind a new simulation server with default config.
    pub async fn bind(address: &str) -> io::Result<Self> {
        Self::bind_with_config(address, DriverConfig::default(), SimEnv::new()).await
    }

    /// Create and bind a new simulation server with custom config.
    pub async fn bind_with_config(
        address: &str,
        config: DriverConfig,
        env: SimEnv,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let relay = Relay::new(env, config).map_err(|e| io::Error::other(e.to_string()))?;

        Ok(Self { relay, listener })
    }

    /// Relay handle, for inspecting state or triggering shutdown.
    pub fn relay(&self) -> &Relay<SimEnv> {
        &self.relay
    }

    /// Accept and serve connections forever.
    pub async fn run(self) -> io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept and serve connections until `shutdown` resolves, then shut
    /// the relay down.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let timer = self.relay.spawn_timer();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    tracing::debug!("sim connection from {}", addr);

                    let relay = self.relay.clone();
                    tokio::spawn(async move {
                        let (reader, writer) = tokio::io::split(stream);
                        relay.serve_connection(reader, writer).await
                    });
                },
            }
        }

        self.relay.shutdown().await;
        timer.abort();

        Ok(())
    }
}

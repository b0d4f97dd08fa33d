//! Parley production server.
//!
//! Broadcast relay: clients claim a unique display name, then every message
//! they send is relayed to everyone else as a JSON line event. Names idle for
//! longer than the inactivity timeout are disconnected.
//!
//! # Architecture
//!
//! [`ServerDriver`] is the Sans-IO coordinator: it owns sessions, the name
//! registry and the inactivity monitor, and turns [`ServerEvent`]s into
//! [`ServerAction`]s. [`Relay`] executes those actions over any async byte
//! stream and runs the inactivity timer. [`Server`] binds a
//! [`QuinnTransport`] and feeds each accepted QUIC stream to the relay.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based coordinator (pure logic, no I/O)
//! - [`Relay`]: Stream runtime shared by production and simulation
//! - [`Server`]: Production runtime over QUIC
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod driver_error;
mod error;
mod relay;
mod system_env;
mod transport;

use std::{future::Future, time::Duration};

pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use driver_error::DriverError;
pub use error::ServerError;
pub use relay::Relay;
pub use system_env::SystemEnv;
pub use transport::{QuinnConnection, QuinnTransport};

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";

/// How long open connections get to drain after the shutdown notice.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3001")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Driver configuration (timeouts, limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            cert_path: None,
            key_path: None,
            driver: DriverConfig::default(),
        }
    }
}

/// Production relay server.
pub struct Server {
    relay: Relay<SystemEnv>,
    transport: QuinnTransport,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let relay = Relay::new(SystemEnv::new(), config.driver)?;
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { relay, transport })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Relay handle, for inspecting live state.
    pub fn relay(&self) -> &Relay<SystemEnv> {
        &self.relay
    }

    /// Run until the endpoint closes.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then notify every client and close.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let timer = self.relay.spawn_timer();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(Some(conn)) => {
                        let relay = self.relay.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, relay).await {
                                tracing::debug!("Connection error: {}", e);
                            }
                        });
                    },
                    Ok(None) => {
                        tracing::warn!("endpoint closed");
                        break;
                    },
                    Err(e) => tracing::warn!("Accept error: {}", e),
                },
            }
        }

        tracing::info!("Shutting down");
        self.relay.shutdown().await;
        self.transport.shutdown(SHUTDOWN_GRACE).await;
        timer.abort();

        Ok(())
    }
}

/// Serve one QUIC connection over its first bidirectional stream.
async fn handle_connection(
    conn: QuinnConnection,
    relay: Relay<SystemEnv>,
) -> Result<(), ServerError> {
    let remote = conn.remote_addr();
    tracing::debug!("connection from {}", remote);

    let (send, recv) = conn.accept_bi().await?;
    let session_id = relay.serve_connection(recv, send).await;

    tracing::debug!(session_id, "connection from {} finished", remote);
    conn.close(0, "closed");

    Ok(())
}

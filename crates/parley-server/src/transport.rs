//! Quinn-based QUIC transport.
//!
//! Each client opens one bidirectional stream and speaks the frame protocol
//! over it. TLS 1.3 comes from rustls; ALPN is pinned to `parley` so clients
//! of other protocols fail the handshake instead of sending garbage frames.
//! Without a certificate a self-signed one is generated, which is only
//! suitable for local testing.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use parley_proto::ALPN_PROTOCOL;
use quinn::{Endpoint, RecvStream, SendStream, ServerConfig};

use crate::error::ServerError;

/// QUIC endpoint accepting relay clients.
pub struct QuinnTransport {
    endpoint: Endpoint,
}

impl QuinnTransport {
    /// Create and bind a new QUIC transport.
    ///
    /// If `cert_path` and `key_path` are both provided, they will be used for
    /// TLS. Otherwise, a self-signed certificate will be generated. Must be
    /// called from within a Tokio runtime.
    pub fn bind(
        address: &str,
        cert_path: Option<&str>,
        key_path: Option<&str>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let tls_config = match (cert_path, key_path) {
            (Some(cert), Some(key)) => load_tls_config(cert, key)?,
            (None, None) => generate_self_signed_config()?,
            _ => {
                return Err(ServerError::Config(
                    "--cert and --key must be given together".to_string(),
                ));
            },
        };

        let endpoint = Endpoint::server(quic_config(tls_config)?, addr)
            .map_err(|e| ServerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::info!("QUIC transport bound to {}", addr);

        Ok(Self { endpoint })
    }

    /// Accept the next connection.
    ///
    /// Returns `Ok(None)` once the endpoint has been closed. A failed
    /// handshake is an error for that attempt only.
    pub async fn accept(&self) -> Result<Option<QuinnConnection>, ServerError> {
        let Some(incoming) = self.endpoint.accept().await else {
            return Ok(None);
        };

        let connection = incoming
            .await
            .map_err(|e| ServerError::Transport(format!("handshake failed: {e}")))?;

        Ok(Some(QuinnConnection { connection }))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Stop accepting, give open connections up to `grace` to finish, then
    /// close the endpoint.
    pub async fn shutdown(&self, grace: Duration) {
        self.endpoint.set_server_config(None);

        if tokio::time::timeout(grace, self.endpoint.wait_idle()).await.is_err() {
            tracing::warn!("connections still open after {:?}, closing endpoint", grace);
        }

        self.endpoint.close(0u32.into(), b"server shutting down");
    }
}

/// One accepted QUIC connection. Clones share the connection.
#[derive(Clone)]
pub struct QuinnConnection {
    connection: quinn::Connection,
}

impl QuinnConnection {
    /// Accept the client's bidirectional stream.
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), ServerError> {
        self.connection
            .accept_bi()
            .await
            .map_err(|e| ServerError::Transport(format!("accept_bi failed: {e}")))
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection with an application error code and reason.
    pub fn close(&self, error_code: u32, reason: &str) {
        self.connection.close(error_code.into(), reason.as_bytes());
    }
}

fn quic_config(mut tls_config: rustls::ServerConfig) -> Result<ServerConfig, ServerError> {
    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
        .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?;

    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}

fn load_tls_config(cert_path: &str, key_path: &str) -> Result<rustls::ServerConfig, ServerError> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| ServerError::Config(format!("failed to read cert '{cert_path}': {e}")))?;

    let key_pem = std::fs::read(key_path)
        .map_err(|e| ServerError::Config(format!("failed to read key '{key_path}': {e}")))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;

    if certs.is_empty() {
        return Err(ServerError::Config(format!("no certificates found in '{cert_path}'")));
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config(format!("no private key found in '{key_path}'")))?;

    rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))
}

fn generate_self_signed_config() -> Result<rustls::ServerConfig, ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_chain = vec![cert.cert.der().clone()];
    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let tls_config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?
    .with_no_client_auth()
    .with_single_cert(cert_chain, key.into())
    .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    tracing::warn!("Using self-signed certificate - not for production use!");

    Ok(tls_config)
}

//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Certificate and key used to terminate HTTPS.
#[cfg(feature = "tls")]
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// PEM file holding the certificate chain.
    pub cert_path: PathBuf,
    /// PEM file holding the private key.
    pub key_path: PathBuf,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// Capacity of the per-connection read buffer.
    pub read_buffer_size: usize,
    /// Bytes handed to a streaming body consumer per call.
    pub chunk_size: usize,
    /// Largest accepted request head (request line plus headers).
    pub max_header_size: usize,
    /// Largest body read into memory for a buffered handler.
    pub max_buffered_body: u64,
    /// Requests served on one connection before it is closed.
    pub keep_alive_max_requests: usize,
    /// How long an idle connection waits for its next request.
    pub keep_alive_timeout: Duration,
    /// Directory served for requests no route matches.
    pub base_dir: Option<PathBuf>,
    /// HTTPS settings; plain HTTP when `None`.
    #[cfg(feature = "tls")]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            chunk_size: 4096,
            max_header_size: 8192,
            max_buffered_body: 8 * 1024 * 1024,
            keep_alive_max_requests: 100,
            keep_alive_timeout: Duration::from_secs(5),
            base_dir: None,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

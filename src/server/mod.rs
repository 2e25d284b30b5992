//! HTTP server implementation for streamhttp.
//!
//! The server reads one request head at a time from a buffered connection,
//! dispatches it to a buffered or streaming handler, runs the error handler
//! and exchange logger, and keeps the connection open while it is reusable.

mod response;
mod config;
mod error;
mod handler;
mod router;
mod body;
mod dump;
mod static_files;
mod http_server;
#[cfg(feature = "tls")]
mod tls;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::ServerConfig;
#[cfg(feature = "tls")]
pub use config::TlsConfig;
#[cfg(feature = "tls")]
pub use tls::load_acceptor;
pub use error::Error;
pub use handler::{Handler, HandlerFuture, Route};
pub use router::Router;
pub use body::{BodyLength, BodyState, BodyStream, ReadLimit, ReadOutcome, ReadSummary};
pub use dump::{dump_exchange, dump_headers, dump_multipart_files};
pub use static_files::{content_type_for, StaticFiles};
pub use http_server::{ErrorHandler, HttpServer, Logger, ServerContext};

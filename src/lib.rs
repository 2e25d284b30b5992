//! A small embeddable HTTP/1.1 server with streaming request bodies.
//!
//! Handlers are registered per `(method, path)` and come in two shapes:
//! buffered handlers receive the request with its body already read into
//! memory (and multipart parts located), while streaming handlers pull the
//! body from the connection chunk by chunk through a [`server::BodyStream`].
//!
//! # Features
//!
//! - Request head parsing with ordered, duplicate-preserving headers and query parameters
//! - Multipart form-data part descriptors without copying part contents
//! - Fixed-length, chunked and close-delimited request bodies with explicit read limits
//! - Error handler and exchange logger hooks
//! - Keep-alive, `Expect: 100-continue`, static files and optional TLS
//! - JSON helpers for request and response bodies
//!
//! # Examples
//!
//! ## Parsing a request head
//!
//! ```
//! use streamhttp::parse_request;
//!
//! let request_bytes = b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
//!
//! match parse_request(request_bytes) {
//!     Ok(request) => {
//!         println!("Method: {}", request.method);
//!         println!("Path: {}", request.path);
//!         println!("Version: {}", request.version);
//!         assert_eq!(request.get_param("page"), Some("2"));
//!     },
//!     Err(err) => {
//!         println!("Error parsing request: {}", err);
//!     }
//! }
//! ```
//!
//! ## Error handling
//!
//! ```
//! use streamhttp::{parse_request, ParserError};
//!
//! let invalid_request = b"INVALID /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
//!
//! match parse_request(invalid_request) {
//!     Ok(_) => println!("Request parsed successfully"),
//!     Err(ParserError::InvalidMethod(method)) => println!("Invalid method: {}", method),
//!     Err(ParserError::MalformedRequestLine(line)) => println!("Malformed request line: {}", line),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! ```
//!
//! ## Registering handlers
//!
//! ```no_run
//! use streamhttp::server::ReadLimit;
//! use streamhttp::{HttpResponse, HttpServer, Method, ServerConfig, ServerError, StatusCode};
//!
//! # async fn run() -> Result<(), ServerError> {
//! let server = HttpServer::new(ServerConfig::default());
//!
//! server.add_route(Method::POST, "/echo", |req| async move {
//!     Ok(HttpResponse::new(StatusCode::Ok).with_body_bytes(req.body.clone()))
//! }).await;
//!
//! server.add_streaming_route(Method::POST, "/count", |_req, mut body| {
//!     Box::pin(async move {
//!         let summary = body.read_content(ReadLimit::Bounded(1 << 30), |_chunk| true).await?;
//!         Ok::<_, ServerError>(HttpResponse::new(StatusCode::Ok).with_body_string(summary.bytes.to_string()))
//!     })
//! }).await;
//!
//! server.start().await
//! # }
//! ```

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Handlers served by the bundled binary
pub mod endpoints;

// Re-export commonly used items for convenience
pub use parser::{
    Error as ParserError, Headers, HttpRequest, HttpVersion, KeyValues, Method, MultipartFile, Params,
    parse_request,
};
pub use server::{Error as ServerError, Handler, HttpResponse, HttpServer, ServerConfig, StatusCode};

//! HTTP request handlers and routing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::parser::{HttpRequest, Method};
use crate::server::body::BodyStream;
use crate::server::{Error, HttpResponse};

/// A boxed future resolving to a handler's response.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send + 'a>>;

/// A handler that runs once the request body has been read into memory.
pub type BufferedFn = Arc<dyn Fn(Arc<HttpRequest>) -> HandlerFuture<'static> + Send + Sync>;

/// A handler that pulls the request body from the connection itself.
pub type StreamingFn = Arc<dyn for<'a> Fn(Arc<HttpRequest>, BodyStream<'a>) -> HandlerFuture<'a> + Send + Sync>;

/// The two ways a handler can receive its request body.
#[derive(Clone)]
pub enum Handler {
    Buffered(BufferedFn),
    Streaming(StreamingFn),
}

impl Handler {
    /// Wrap an async function of the request.
    pub fn buffered<F, Fut>(handler: F) -> Self
    where
        F: Fn(Arc<HttpRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Handler::Buffered(Arc::new(move |req: Arc<HttpRequest>| -> HandlerFuture<'static> {
            Box::pin(handler(req))
        }))
    }

    /// Wrap a function of the request and its unread body.
    ///
    /// The returned future may borrow the body stream, so it has to be boxed
    /// by the caller:
    ///
    /// ```
    /// use streamhttp::server::{Handler, ReadLimit};
    /// use streamhttp::{HttpResponse, ServerError, StatusCode};
    ///
    /// let handler = Handler::streaming(|_req, mut body| {
    ///     Box::pin(async move {
    ///         let summary = body.read_content(ReadLimit::Bounded(1 << 20), |_| true).await?;
    ///         Ok::<_, ServerError>(HttpResponse::new(StatusCode::Ok).with_body_string(summary.bytes.to_string()))
    ///     })
    /// });
    /// assert!(handler.is_streaming());
    /// ```
    pub fn streaming<F>(handler: F) -> Self
    where
        F: for<'a> Fn(Arc<HttpRequest>, BodyStream<'a>) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        Handler::Streaming(Arc::new(handler))
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Handler::Streaming(_))
    }
}

/// Represents a route in the HTTP server.
#[derive(Clone)]
pub struct Route {
    /// The HTTP method to match.
    pub method: Method,
    /// The exact path to match.
    pub path: String,
    /// The handler.
    pub handler: Handler,
}

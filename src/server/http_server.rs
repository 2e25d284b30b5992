//! HTTP server implementation.

use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinSet;
use tokio::signal;
use log::{debug, info, warn, error};
use std::net::SocketAddr;

use crate::parser::{BodyMode, HttpRequest, Method, is_multipart_form_data, parse_boundary, parse_multipart, parse_request};
use crate::server::body::{BodyLength, BodyState, BodyStream, ReadLimit};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::{Handler, HandlerFuture};
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::Router;
use crate::server::static_files::StaticFiles;

/// Fills in the body of an error response the handler left empty.
pub type ErrorHandler = Arc<dyn Fn(&HttpRequest, &mut HttpResponse) + Send + Sync>;

/// Receives every finished request/response pair.
pub type Logger = Arc<dyn Fn(&HttpRequest, &HttpResponse) -> io::Result<()> + Send + Sync>;

/// Everything a connection needs, fixed before the first request is served.
#[derive(Clone)]
pub struct ServerContext {
    pub config: ServerConfig,
    pub routes: Arc<RwLock<Router>>,
    pub static_files: Option<StaticFiles>,
    pub error_handler: Option<ErrorHandler>,
    pub logger: Option<Logger>,
    #[cfg(feature = "tls")]
    pub tls: Option<tokio_rustls::TlsAcceptor>,
}

/// An HTTP server.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The routes.
    pub routes: Arc<RwLock<Router>>,
    error_handler: Option<ErrorHandler>,
    logger: Option<Logger>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Arc::new(RwLock::new(Router::new())),
            error_handler: None,
            logger: None,
        }
    }

    /// Register a handler that receives the request with its body read into memory.
    pub async fn add_route<F, Fut>(&self, method: Method, path: impl Into<String>, handler: F)
    where
        F: Fn(Arc<HttpRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.routes.write().await.add(method, path, Handler::buffered(handler));
    }

    /// Register a handler that reads the request body from the connection itself.
    pub async fn add_streaming_route<F>(&self, method: Method, path: impl Into<String>, handler: F)
    where
        F: for<'a> Fn(Arc<HttpRequest>, BodyStream<'a>) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.routes.write().await.add(method, path, Handler::streaming(handler));
    }

    /// Install the handler that renders bodies for empty error responses.
    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
    }

    /// Install the exchange logger. Its errors never reach the client.
    pub fn set_logger<F>(&mut self, logger: F)
    where
        F: Fn(&HttpRequest, &HttpResponse) -> io::Result<()> + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
    }

    /// Snapshot of the configuration and hooks for serving connections.
    pub fn context(&self) -> ServerContext {
        ServerContext {
            config: self.config.clone(),
            routes: self.routes.clone(),
            static_files: self.config.base_dir.clone().map(StaticFiles::new),
            error_handler: self.error_handler.clone(),
            logger: self.logger.clone(),
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    /// Log the registered endpoints.
    async fn display_server_info(&self) {
        let routes = self.routes.read().await;
        info!("Registered endpoints:");
        for route in routes.routes() {
            let kind = if route.handler.is_streaming() { "streaming" } else { "buffered" };
            info!("  {} {} ({kind})", route.method, route.path);
        }
        if let Some(base_dir) = &self.config.base_dir {
            info!("Serving static files from {}", base_dir.display());
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        #[cfg(feature = "tls")]
        let scheme = if self.config.tls.is_some() { "https" } else { "http" };
        #[cfg(not(feature = "tls"))]
        let scheme = "http";
        info!("Server listening on {scheme}://{addr}", addr = self.config.addr);
        Ok(listener)
    }

    /// Set up a Ctrl+C handler for graceful shutdown.
    fn setup_ctrl_c_handler(shutdown_tx: mpsc::Sender<()>, tasks: &mut JoinSet<()>) {
        tasks.spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    let _ = shutdown_tx.send(()).await;
                }
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                }
            }
        });
    }

    /// Handle a new connection.
    pub(crate) async fn handle_new_connection(
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: Arc<tokio::sync::Semaphore>,
        ctx: Arc<ServerContext>,
        tasks: &mut JoinSet<()>,
    ) {
        // Try to acquire a permit from the semaphore
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let mut response = HttpResponse::new(StatusCode::ServiceUnavailable)
                    .with_content_type("text/plain")
                    .with_body_string("Server is at capacity, please try again later");
                response.finalize(false);
                let _ = socket.write_all(&response.to_bytes()).await;
                return;
            }
        };

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;
            if let Err(e) = Self::serve_socket(socket, &ctx).await {
                error!("Error handling connection from {addr}: {e}");
            }
        });
    }

    /// Terminate TLS if configured, then serve the connection.
    async fn serve_socket(socket: TcpStream, ctx: &ServerContext) -> Result<(), Error> {
        #[cfg(feature = "tls")]
        {
            if let Some(acceptor) = &ctx.tls {
                let stream = acceptor.accept(socket).await?;
                return Self::handle_connection(stream, ctx).await;
            }
        }
        Self::handle_connection(socket, ctx).await
    }

    /// Handle connection errors.
    async fn handle_connection_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());

        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        }).await;

        info!("Server shutdown complete");
    }

    /// Start the server and listen for incoming connections.
    pub async fn start(&self) -> Result<(), Error> {
        #[cfg(feature = "tls")]
        let ctx = ServerContext {
            tls: self.config.tls.as_ref().map(crate::server::tls::load_acceptor).transpose()?,
            ..self.context()
        };
        #[cfg(not(feature = "tls"))]
        let ctx = self.context();
        let ctx = Arc::new(ctx);

        self.display_server_info().await;
        let listener = self.setup_listener().await?;

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_connections));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let mut tasks = JoinSet::new();

        Self::setup_ctrl_c_handler(shutdown_tx, &mut tasks);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            debug!("Accepted connection from {addr}");
                            Self::handle_new_connection(
                                socket,
                                addr,
                                semaphore.clone(),
                                ctx.clone(),
                                &mut tasks,
                            ).await;
                        },
                        Err(e) => {
                            if Self::handle_connection_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Serve requests on one connection until it closes or stops being reusable.
    pub async fn handle_connection<S>(socket: S, ctx: &ServerContext) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut conn = BufReader::with_capacity(ctx.config.read_buffer_size, socket);
        let mut served = 0;

        loop {
            let head = if served == 0 {
                Self::read_head(&mut conn, ctx.config.max_header_size).await
            } else {
                match tokio::time::timeout(
                    ctx.config.keep_alive_timeout,
                    Self::read_head(&mut conn, ctx.config.max_header_size),
                ).await {
                    Ok(head) => head,
                    Err(_) => {
                        debug!("Closing idle connection after {served} requests");
                        return Ok(());
                    }
                }
            };

            let head = match head {
                Ok(Some(head)) => head,
                Ok(None) => return Ok(()), // Connection closed
                Err(e) => {
                    Self::reject(&mut conn, &e).await?;
                    return Err(e);
                }
            };

            served += 1;
            if !Self::serve_request(&mut conn, &head, ctx, served).await? {
                return Ok(());
            }
        }
    }

    /// Read one request head, up to and including the blank line.
    ///
    /// Returns `None` when the peer closed the connection between requests.
    async fn read_head<R>(conn: &mut R, limit: usize) -> Result<Option<Vec<u8>>, Error>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut head = Vec::new();
        loop {
            let remaining = limit.saturating_sub(head.len()) as u64;
            if remaining == 0 {
                return Err(Error::HeaderTooLarge { limit });
            }

            let start = head.len();
            let n = (&mut *conn).take(remaining).read_until(b'\n', &mut head).await?;
            if n == 0 {
                return Ok((!head.is_empty()).then_some(head));
            }
            if head.last() != Some(&b'\n') {
                if n as u64 == remaining {
                    return Err(Error::HeaderTooLarge { limit });
                }
                // Peer closed mid-line; let the parser judge what arrived.
                return Ok(Some(head));
            }

            let line = &head[start..];
            if line == b"\r\n" || line == b"\n" {
                if start == 0 {
                    // Stray line breaks between requests are ignored.
                    head.clear();
                    continue;
                }
                return Ok(Some(head));
            }
        }
    }

    /// Run one request through dispatch, error handling and logging.
    ///
    /// Returns whether the connection can carry another request.
    async fn serve_request<S>(
        conn: &mut BufReader<S>,
        head: &[u8],
        ctx: &ServerContext,
        served: usize,
    ) -> Result<bool, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let parsed = parse_request(head).and_then(|request| {
            let length = BodyLength::of(&request)?;
            Ok((request, length))
        });
        let (mut request, length) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                let e = Error::ParseError(e);
                Self::reject(conn, &e).await?;
                return Err(e);
            }
        };
        let mut body = BodyState::new(length);

        let handler = ctx.routes.read().await.find(request.method, &request.path).cloned();

        // A buffered body that is declared too large is refused without the interim response.
        let within_cap = match &handler {
            Some(Handler::Buffered(_)) => length.declared().map_or(true, |n| n <= ctx.config.max_buffered_body),
            Some(Handler::Streaming(_)) => true,
            None => false,
        };
        if within_cap && !body.is_complete() && Self::expects_continue(&request) {
            let interim = StatusCode::Continue;
            conn.write_all(format!("HTTP/1.1 {interim} {}\r\n\r\n", interim.reason_phrase()).as_bytes()).await?;
            conn.flush().await?;
        }

        let prepared = match &handler {
            Some(Handler::Buffered(_)) => {
                Self::buffer_body(conn, &mut body, &mut request, &ctx.config).await
            }
            Some(Handler::Streaming(_)) => {
                request.body_mode = BodyMode::Streaming;
                Ok(())
            }
            None => Ok(()),
        };

        let request = Arc::new(request);
        let result = match (prepared, handler) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(Handler::Buffered(handler))) => handler(Arc::clone(&request)).await,
            (Ok(()), Some(Handler::Streaming(handler))) => {
                let stream = BodyStream::new(&mut *conn, &mut body, ctx.config.chunk_size);
                handler(Arc::clone(&request), stream).await
            }
            (Ok(()), None) => Self::fallback(&request, ctx).await,
        };

        let mut failed = false;
        let mut response = result.unwrap_or_else(|e| {
            error!("{} {} failed: {e}", request.method, request.path);
            failed = true;
            HttpResponse::new(e.status_code())
        });

        if response.status.is_error() && response.body.is_empty() {
            if let Some(error_handler) = &ctx.error_handler {
                error_handler(request.as_ref(), &mut response);
            }
        }

        let keep_alive = !failed
            && body.is_complete()
            && request.wants_keep_alive()
            && served < ctx.config.keep_alive_max_requests;
        response.finalize(keep_alive);

        let bytes = if request.method == Method::HEAD {
            response.head_bytes()
        } else {
            response.to_bytes()
        };
        let written = Self::write_response(conn, &bytes).await;

        Self::log_exchange(&request, &response, ctx);

        written?;
        Ok(keep_alive)
    }

    fn expects_continue(request: &HttpRequest) -> bool {
        request.version.is_persistent_by_default()
            && request
                .get_header("Expect")
                .is_some_and(|expect| expect.eq_ignore_ascii_case("100-continue"))
    }

    /// Read the body for a buffered handler and extract multipart descriptors.
    async fn buffer_body<S>(
        conn: &mut BufReader<S>,
        body: &mut BodyState,
        request: &mut HttpRequest,
        config: &ServerConfig,
    ) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if !body.is_complete() {
            request.body = BodyStream::new(&mut *conn, body, config.chunk_size)
                .read_to_end(ReadLimit::Bounded(config.max_buffered_body))
                .await?;
        }

        let boundary = request
            .get_header("Content-Type")
            .filter(|content_type| is_multipart_form_data(content_type))
            .map(parse_boundary)
            .transpose()?;
        if let Some(boundary) = boundary {
            request.files = parse_multipart(&request.body, &boundary)?;
        }
        Ok(())
    }

    /// Static files for unmatched requests, else 404.
    async fn fallback(request: &HttpRequest, ctx: &ServerContext) -> Result<HttpResponse, Error> {
        if let Some(static_files) = &ctx.static_files {
            if let Some(response) = static_files.serve(request).await? {
                return Ok(response);
            }
        }
        Ok(HttpResponse::new(StatusCode::NotFound))
    }

    fn log_exchange(request: &HttpRequest, response: &HttpResponse, ctx: &ServerContext) {
        if let Some(logger) = &ctx.logger {
            if let Err(e) = logger(request, response) {
                warn!("Exchange logger failed: {e}");
            }
        }
    }

    async fn write_response<W>(conn: &mut W, bytes: &[u8]) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        conn.write_all(bytes).await?;
        conn.flush().await?;
        Ok(())
    }

    /// Answer a request whose head could not be read or parsed, then give up on the connection.
    async fn reject<W>(conn: &mut W, e: &Error) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut response = HttpResponse::new(e.status_code())
            .with_content_type("text/plain")
            .with_body_string(format!("Error parsing request: {e}"));
        response.finalize(false);
        Self::write_response(conn, &response.to_bytes()).await
    }
}

//! Handlers served by the `simplesvr` binary.
//!
//! `POST /multipart` reports the request headers and multipart parts,
//! `POST /multi2` digests the body as it streams in. Error responses get a
//! small HTML body and every exchange is written to stdout.

use std::io::{self, Write};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::parser::{HttpRequest, Method};
use crate::server::{
    dump_exchange, dump_headers, dump_multipart_files, BodyStream, Error, HandlerFuture, HttpResponse, HttpServer,
    ReadLimit, StatusCode,
};

/// Largest body `/multi2` will digest.
pub const STREAM_DIGEST_LIMIT: u64 = 1 << 30;

/// Header dump followed by the multipart part dump, as `text/plain`.
pub async fn multipart_report(req: Arc<HttpRequest>) -> Result<HttpResponse, Error> {
    let body = dump_headers(&req.headers) + &dump_multipart_files(&req.files);
    Ok(HttpResponse::new(StatusCode::Ok)
        .with_content_type("text/plain")
        .with_body_string(body))
}

/// SHA-256 of the request body, fed one chunk at a time.
///
/// The report names how many chunks the reader delivered.
pub fn stream_digest(_req: Arc<HttpRequest>, mut body: BodyStream<'_>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let mut hasher = Sha256::new();
        let mut calls = 0usize;
        body.read_content(ReadLimit::Bounded(STREAM_DIGEST_LIMIT), |chunk| {
            hasher.update(chunk);
            calls += 1;
            true
        })
        .await?;

        let report = format!(
            "req body stream:\nchunks:{calls}\nsha256:{}\n",
            hex::encode(hasher.finalize())
        );
        Ok(HttpResponse::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body_string(report))
    })
}

/// Render the status into an HTML body, unless the handler already wrote one.
pub fn html_error_handler(_req: &HttpRequest, res: &mut HttpResponse) {
    if !res.body.is_empty() {
        return;
    }
    let body = format!("<p>Error Status: <span style='color:red;'>{}</span></p>", res.status);
    res.set_content(body, "text/html");
}

/// Write the exchange record to `out`.
pub fn write_exchange<W: Write>(out: &mut W, req: &HttpRequest, res: &HttpResponse) -> io::Result<()> {
    out.write_all(dump_exchange(req, res).as_bytes())?;
    out.flush()
}

pub fn stdout_logger(req: &HttpRequest, res: &HttpResponse) -> io::Result<()> {
    write_exchange(&mut io::stdout().lock(), req, res)
}

/// Install the endpoints and hooks on `server`.
pub async fn register(server: &mut HttpServer) {
    server.add_route(Method::POST, "/multipart", multipart_report).await;
    server.add_streaming_route(Method::POST, "/multi2", stream_digest).await;
    server.set_error_handler(html_error_handler);
    server.set_logger(stdout_logger);
}

//! HTTP request parsing and representation.

use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::fields::{Headers, Params};
use crate::parser::method::Method;
use crate::parser::multipart::MultipartFile;
use crate::parser::version::HttpVersion;

/// How the handler that served a request got at its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// The body was read into [`HttpRequest::body`] before the handler ran.
    #[default]
    Buffered,
    /// The handler pulled the body from the connection itself.
    Streaming,
}

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path, without the query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers, in wire order
    pub headers: Headers,
    /// Query parameters decoded from the request target, in wire order
    pub params: Params,
    /// Multipart part descriptors, filled for buffered multipart bodies
    pub files: Vec<MultipartFile>,
    /// The request body (empty for streaming handlers)
    pub body: Vec<u8>,
    /// Whether the body was buffered or streamed
    pub body_mode: BodyMode,
}

impl HttpRequest {
    /// Create a request from a request target. The path is percent-decoded
    /// and the query string form-decoded.
    pub fn new(method: Method, target: &str, version: HttpVersion, headers: Headers) -> Self {
        let (path, params) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Params::new()),
        };

        Self {
            method,
            path: String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned(),
            version,
            headers,
            params,
            files: Vec::new(),
            body: Vec::new(),
            body_mode: BodyMode::Buffered,
        }
    }

    /// Create a request with an already-read body.
    pub fn with_body(method: Method, target: &str, version: HttpVersion, headers: Headers, body: Vec<u8>) -> Self {
        let mut request = Self::new(method, target, version, headers);
        request.body = body;
        request
    }

    /// Get a header value, ignoring ASCII case in the name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains(name)
    }

    /// The content of a multipart part, looked up by field name.
    pub fn file_content(&self, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|file| file.name == name)
            .and_then(|file| file.content(&self.body))
    }

    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Check if the Content-Type header is application/json.
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    /// The declared `Content-Length`, if any.
    ///
    /// Repeated headers must agree.
    pub fn content_length(&self) -> Result<Option<u64>, Error> {
        let mut declared = None;
        for value in self.headers.get_all("Content-Length") {
            let length = value
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::InvalidContentLength(value.to_string()))?;
            match declared {
                Some(previous) if previous != length => {
                    return Err(Error::InvalidContentLength(value.to_string()));
                }
                _ => declared = Some(length),
            }
        }
        Ok(declared)
    }

    /// Whether the final transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all("Transfer-Encoding")
            .flat_map(|value| value.split(','))
            .last()
            .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }

    /// Whether the client asked to keep the connection open afterwards.
    pub fn wants_keep_alive(&self) -> bool {
        let connection = self.get_header("Connection").unwrap_or_default();
        let has = |token: &str| connection.split(',').any(|t| t.trim().eq_ignore_ascii_case(token));
        if self.version.is_persistent_by_default() {
            !has("close")
        } else {
            has("keep-alive")
        }
    }
}

/// Decode an `application/x-www-form-urlencoded` query string.
pub fn parse_query(query: &str) -> Params {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parse an HTTP request head: the request line and the header block.
///
/// The input may stop at the blank line or include it; anything after the
/// blank line is ignored. The returned request has an empty body.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let input_str = std::str::from_utf8(input)
        .map_err(|_| Error::MalformedRequestLine("Invalid UTF-8".to_string()))?;

    let mut lines = input_str.lines();

    let request_line = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::EmptyRequest),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let target = parts[1];
    if !target.starts_with('/') {
        return Err(Error::InvalidPath);
    }
    let raw_path = target.split_once('?').map_or(target, |(path, _)| path);
    if urlencoding::decode(raw_path).is_err() {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = Headers::new();
    for line in lines {
        // Empty line indicates the end of headers
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidHeaderFormat(line.to_string()));
        }

        headers.append(name, value.trim());
    }

    if version == HttpVersion::Http11 && !headers.contains("Host") {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    let request = HttpRequest::new(method, target, version, headers);
    request.content_length()?;
    Ok(request)
}

//! Multipart part descriptors for buffered `multipart/form-data` bodies.
//!
//! Parsing never copies part contents. Each part is reported as an
//! `offset`/`length` window into the body it was parsed from.

use crate::parser::error::Error;

/// RFC 2046 caps boundaries at 70 characters.
const MAX_BOUNDARY_LEN: usize = 70;

/// Metadata for one part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultipartFile {
    /// The `name` parameter of `Content-Disposition`.
    pub name: String,
    /// The `filename` parameter, empty for plain form fields.
    pub filename: String,
    /// The part's `Content-Type`, empty when absent.
    pub content_type: String,
    /// Start of the part content within the body.
    pub offset: usize,
    /// Length of the part content.
    pub length: usize,
}

impl MultipartFile {
    /// The part content within `body`, if the window fits.
    pub fn content<'a>(&self, body: &'a [u8]) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(self.length)?;
        body.get(self.offset..end)
    }
}

/// Whether a `Content-Type` value announces `multipart/form-data`.
pub fn is_multipart_form_data(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|main| main.trim().eq_ignore_ascii_case("multipart/form-data"))
}

/// Extract the boundary from a `multipart/form-data` content type.
pub fn parse_boundary(content_type: &str) -> Result<String, Error> {
    if !is_multipart_form_data(content_type) {
        return Err(Error::MissingBoundary);
    }

    for param in content_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
                return Err(Error::MissingBoundary);
            }
            return Ok(boundary.to_string());
        }
    }

    Err(Error::MissingBoundary)
}

/// Parse the part descriptors of a complete multipart body, in body order.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<MultipartFile>, Error> {
    let dash_boundary = format!("--{boundary}").into_bytes();
    let delimiter = format!("\r\n--{boundary}").into_bytes();

    // A preamble before the first boundary is allowed and ignored.
    let mut pos = find(body, &dash_boundary, 0)
        .ok_or(Error::InvalidMultipart("opening boundary not found"))?
        + dash_boundary.len();

    let mut files = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(files);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(Error::InvalidMultipart("expected CRLF after boundary"));
        }
        pos += 2;

        // Every part needs a Content-Disposition name, so an empty header
        // block is rejected along with nameless parts.
        if body[pos..].starts_with(b"\r\n") {
            return Err(Error::InvalidMultipart("part without a name"));
        }
        let header_end = find(body, b"\r\n\r\n", pos)
            .ok_or(Error::InvalidMultipart("unterminated part headers"))?;
        let block = std::str::from_utf8(&body[pos..header_end])
            .map_err(|_| Error::InvalidMultipart("part headers are not UTF-8"))?;
        let mut file = parse_part_headers(block)?;
        let content_start = header_end + 4;

        if file.name.is_empty() {
            return Err(Error::InvalidMultipart("part without a name"));
        }

        let content_end = find(body, &delimiter, content_start)
            .ok_or(Error::InvalidMultipart("closing boundary not found"))?;
        file.offset = content_start;
        file.length = content_end - content_start;
        files.push(file);

        pos = content_end + delimiter.len();
    }
}

fn parse_part_headers(block: &str) -> Result<MultipartFile, Error> {
    let mut file = MultipartFile::default();
    for line in block.split("\r\n") {
        let (name, value) = line
            .split_once(':')
            .ok_or(Error::InvalidMultipart("part header without ':'"))?;
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-disposition") {
            for param in split_unquoted(value, ';').into_iter().skip(1) {
                let Some((key, val)) = param.split_once('=') else {
                    continue;
                };
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => file.name = unquote(val.trim()),
                    "filename" => file.filename = unquote(val.trim()),
                    _ => {}
                }
            }
        } else if name.trim().eq_ignore_ascii_case("content-type") {
            file.content_type = value.to_string();
        }
    }
    Ok(file)
}

/// Split on `sep` everywhere outside a quoted string.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut start, mut quoted, mut escaped) = (0, false, false);
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Strip the quotes from a quoted-string and resolve `\` escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|p| p + from)
}

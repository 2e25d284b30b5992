//! Plain-text renderings of requests and responses.
//!
//! The same functions build diagnostic response bodies and exchange log
//! records, so both always show a collection identically.

use crate::parser::{HttpRequest, KeyValues, MultipartFile};
use crate::server::response::HttpResponse;

const RECORD_SEPARATOR: &str = "================================\n";
const SECTION_SEPARATOR: &str = "--------------------------------\n";
const PART_SEPARATOR: &str = "----------------\n";

/// One `name: value` line per entry, in collection order.
pub fn dump_headers(headers: &KeyValues) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}\n"))
        .collect()
}

/// A banner line followed by one block per multipart part.
pub fn dump_multipart_files(files: &[MultipartFile]) -> String {
    let mut out = String::from(SECTION_SEPARATOR);
    for file in files {
        out.push_str(&format!("name: {}\n", file.name));
        out.push_str(&format!("filename: {}\n", file.filename));
        out.push_str(&format!("content type: {}\n", file.content_type));
        out.push_str(&format!("text offset: {}\n", file.offset));
        out.push_str(&format!("text length: {}\n", file.length));
        out.push_str(PART_SEPARATOR);
    }
    out
}

/// The query string rebuilt from decoded parameters, `?`-prefixed.
fn dump_query(params: &KeyValues) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, (key, value))| format!("{}{key}={value}", if i == 0 { '?' } else { '&' }))
        .collect()
}

/// The exchange log record for a finished request.
pub fn dump_exchange(req: &HttpRequest, res: &HttpResponse) -> String {
    let mut out = String::from(RECORD_SEPARATOR);
    out.push_str(&format!("{} {} {}{}\n", req.method, req.version, req.path, dump_query(&req.params)));
    out.push_str(&dump_headers(&req.headers));
    out.push_str(&dump_multipart_files(&req.files));
    out.push_str(SECTION_SEPARATOR);
    out.push_str(&format!("{}\n", res.status));
    out.push_str(&dump_headers(&res.headers));
    out
}

//! HTTP parser module.
//!
//! Request-head parsing and the request data model: ordered header and
//! query collections, and multipart part descriptors.

mod request;
mod method;
mod version;
mod error;
mod fields;
mod multipart;

// Re-export public items
pub use request::{BodyMode, HttpRequest, parse_query, parse_request};
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;
pub use fields::{Headers, KeyValues, Params};
pub use multipart::{MultipartFile, is_multipart_form_data, parse_boundary, parse_multipart};

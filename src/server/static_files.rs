//! Serving files from a base directory for requests no route matched.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::parser::{HttpRequest, Method};
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// A read-only view of a directory tree.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a request path onto the base directory.
    ///
    /// Returns `None` for paths that would leave the base directory.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.base_dir.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        if path.ends_with('/') {
            resolved.push("index.html");
        }
        Some(resolved)
    }

    /// Serve `req` from disk.
    ///
    /// `Ok(None)` means there is nothing to serve: not a `GET`/`HEAD`, an
    /// unsafe path, or no such file.
    pub async fn serve(&self, req: &HttpRequest) -> Result<Option<HttpResponse>, Error> {
        if !matches!(req.method, Method::GET | Method::HEAD) {
            return Ok(None);
        }
        let Some(mut file) = self.resolve(&req.path) else {
            debug!("Rejected static path {}", req.path);
            return Ok(None);
        };

        match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_dir() => file.push("index.html"),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let body = match tokio::fs::read(&file).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        debug!("Serving {} from {}", req.path, file.display());
        Ok(Some(
            HttpResponse::new(StatusCode::Ok)
                .with_content_type(content_type_for(&file))
                .with_body_bytes(body),
        ))
    }
}

/// `Content-Type` by file extension.
pub fn content_type_for(file: &Path) -> &'static str {
    let extension = file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_stays_inside_base() {
        let files = StaticFiles::new("/srv/www");
        assert_eq!(files.resolve("/a/b.txt"), Some(PathBuf::from("/srv/www/a/b.txt")));
        assert_eq!(files.resolve("/./a"), Some(PathBuf::from("/srv/www/a")));
        assert_eq!(files.resolve("/docs/"), Some(PathBuf::from("/srv/www/docs/index.html")));
        assert_eq!(files.resolve("/../etc/passwd"), None);
        assert_eq!(files.resolve("/a/../../b"), None);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("index.HTML")), "text/html");
        assert_eq!(content_type_for(Path::new("a.txt")), "text/plain");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}

//! Exact-match route table.

use crate::parser::Method;
use crate::server::handler::{Handler, Route};

/// Maps `(method, path)` to a handler.
///
/// Lookups compare the method and the full path exactly. When the same
/// pair is registered twice the earlier registration wins.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` and `path`.
    pub fn add(&mut self, method: Method, path: impl Into<String>, handler: Handler) {
        self.routes.push(Route {
            method,
            path: path.into(),
            handler,
        });
    }

    /// The handler registered first for `method` and `path`.
    pub fn find(&self, method: Method, path: &str) -> Option<&Handler> {
        self.routes
            .iter()
            .find(|route| route.method == method && route.path == path)
            .map(|route| &route.handler)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

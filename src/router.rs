//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`].

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// Result of matching a method + path against the routing table.
pub(crate) enum Route {
    Found(BoxedHandler),
    /// The path exists, but not for this method.
    MethodNotAllowed,
    NotFound,
}

/// The application router. Build it once at startup and hand it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for the same method. Routes are fixed at startup, so this
    /// is a programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self
    }

    /// Matches the path first, then the method. An unroutable method on a
    /// known path is a 405; any method on an unknown path is a 404.
    pub(crate) fn lookup(&self, method: &http::Method, path: &str) -> Route {
        let tree = Method::try_from(method).ok().and_then(|m| self.routes.get(&m));
        if let Some(matched) = tree.and_then(|tree| tree.at(path).ok()) {
            return Route::Found(Arc::clone(matched.value));
        }

        if self.routes.values().any(|tree| tree.at(path).is_ok()) {
            Route::MethodNotAllowed
        } else {
            Route::NotFound
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

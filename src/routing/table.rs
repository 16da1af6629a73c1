//! Ordered route table.
//!
//! Routes are tried in registration order and the first one whose method
//! and pattern both match wins. There is no most-specific-match heuristic,
//! so ordering is part of the contract: register `things/:id` before
//! `things/**rest` if both should be reachable.
//!
//! The table is built once at startup and is read-only afterwards; lookups
//! need no synchronization.

use std::sync::Arc;

use tracing::debug;

use crate::error::RegistrationError;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::routing::controller::{self, Controller};
use crate::routing::pattern::{Params, Pattern};

/// One (method, pattern, handler) entry.
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxedHandler,
}

impl Route {
    /// Builds a route from a pattern string, failing on an invalid pattern.
    pub fn new(method: Method, pattern: &str, handler: impl Handler) -> Result<Self, RegistrationError> {
        Ok(Self::from_parts(method, Pattern::parse(pattern)?, handler.into_boxed_handler()))
    }

    pub(crate) fn from_parts(method: Method, pattern: Pattern, handler: BoxedHandler) -> Self {
        Self { method, pattern, handler }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Route({} {})", self.method, self.pattern)
    }
}

/// The route selected for a request plus its captured parameters.
pub struct Matched<'a> {
    pub route: &'a Route,
    pub params: Params,
}

impl Matched<'_> {
    /// Runs the route's handler.
    pub async fn call(self, req: Request) -> Response {
        let handler = Arc::clone(&self.route.handler);
        handler.call(req, self.params).await
    }
}

/// The application route table.
///
/// Each [`Router::on`] call returns `self` so registrations chain:
///
/// ```rust
/// use fascia::{Method, Params, Request, Router, Status};
///
/// async fn get_thing(_: Request, p: Params) -> String {
///     p.get("id").unwrap_or_default().to_owned()
/// }
/// async fn get_nested(_: Request, _: Params) -> Status { Status::Ok }
///
/// let router = Router::new()
///     .on(Method::Get, "things/:id", get_thing)
///     .on(Method::Get, "things/**rest", get_nested);
/// assert_eq!(router.len(), 2);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a handler for a method + pattern pair. Returns `self` for
    /// chaining.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is invalid. Route declarations are startup
    /// configuration; use [`Route::new`] and [`Router::add_route`] to handle
    /// the error instead.
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        let route = Route::new(method, pattern, handler)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        self.add_route(route);
        self
    }

    /// Appends a route. It is tried after every route already present.
    pub fn add_route(&mut self, route: Route) {
        debug!(method = %route.method, pattern = %route.pattern, "route added");
        self.routes.push(route);
    }

    /// Registers every route a controller declares, in declaration order.
    pub fn mount<C: Controller + ?Sized>(mut self, controller: Arc<C>) -> Result<Self, RegistrationError> {
        for route in controller::routes_for(controller)? {
            self.add_route(route);
        }
        Ok(self)
    }

    /// Finds the first route matching `method` and `path`.
    ///
    /// `None` is the normal "unhandled" outcome; the caller decides the
    /// status code.
    pub fn handle(&self, method: Method, path: &str) -> Option<Matched<'_>> {
        self.routes.iter()
            .filter(|r| r.method == method)
            .find_map(|route| route.pattern.matches(path).map(|params| Matched { route, params }))
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

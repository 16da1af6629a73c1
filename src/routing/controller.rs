//! Route registration from controllers.
//!
//! A controller is a handler-bearing object: it declares a base path and a
//! list of [`RouteDef`]s, each with a method, a sub-path and the names of
//! the path parameters its handler binds. Registration joins base and
//! sub-path, checks every declared parameter against the pattern, and wraps
//! the handler so it receives exactly its declared parameters.
//!
//! ```rust
//! use std::sync::Arc;
//! use fascia::{Controller, Method, Params, Request, RouteDef, Router};
//!
//! struct Things;
//!
//! impl Controller for Things {
//!     fn base_path(&self) -> &str { "api/things" }
//!
//!     fn routes(self: Arc<Self>) -> Vec<RouteDef> {
//!         vec![
//!             RouteDef::new(Method::Get, "~", |_req: Request, _p: Params| async { "all" }),
//!             RouteDef::new(Method::Get, ":id", |_req: Request, p: Params| async move {
//!                 p.get("id").unwrap_or_default().to_owned()
//!             })
//!             .param("id"),
//!         ]
//!     }
//! }
//!
//! let router = Router::new().mount(Arc::new(Things)).unwrap();
//! assert_eq!(router.len(), 2);
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::error::RegistrationError;
use crate::handler::{BindingHandler, BoxedHandler, Handler};
use crate::method::Method;
use crate::routing::pattern::Pattern;
use crate::routing::table::Route;

/// A handler-bearing object.
pub trait Controller: Send + Sync + 'static {
    /// Base path every route of this controller lives under.
    fn base_path(&self) -> &str;

    /// The routes this controller serves, in the order they are tried.
    /// Handlers typically capture a clone of `self`.
    fn routes(self: Arc<Self>) -> Vec<RouteDef>;
}

/// One declared route of a controller.
pub struct RouteDef {
    method: Method,
    sub_path: String,
    params: Vec<String>,
    handler: BoxedHandler,
}

impl RouteDef {
    /// Declares `method` on `sub_path` relative to the controller base.
    /// A sub-path of `~` or `""` is the base path itself.
    pub fn new(method: Method, sub_path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            sub_path: sub_path.to_owned(),
            params: Vec::new(),
            handler: handler.into_boxed_handler(),
        }
    }

    /// Binds the captured parameter `name`. Call once per parameter, in the
    /// order the handler reads them positionally.
    pub fn param(mut self, name: &str) -> Self {
        self.params.push(name.to_owned());
        self
    }

    fn into_route(self, base_path: &str) -> Result<Route, RegistrationError> {
        let pattern = Pattern::join(base_path, &self.sub_path)?;

        if let Some(missing) = self.params.iter().find(|p| !pattern.capture_names().any(|n| n == p.as_str())) {
            return Err(RegistrationError::UnboundParameter {
                route: format!("{} {}", self.method, pattern),
                param: missing.clone(),
            });
        }

        let handler: BoxedHandler = Arc::new(BindingHandler {
            declared: self.params,
            inner: self.handler,
        });
        Ok(Route::from_parts(self.method, pattern, handler))
    }
}

/// Builds the routes of one controller.
pub(crate) fn routes_for<C: Controller + ?Sized>(controller: Arc<C>) -> Result<Vec<Route>, RegistrationError> {
    let base = controller.base_path().to_owned();
    let routes = Arc::clone(&controller)
        .routes()
        .into_iter()
        .map(|def| def.into_route(&base))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(base = %base, routes = routes.len(), "controller registered");
    Ok(routes)
}

/// Flattens a set of controllers into route table entries.
///
/// Fails on the first route that cannot be served; nothing is returned in
/// that case, so a broken declaration stops startup.
pub fn register(controllers: &[Arc<dyn Controller>]) -> Result<Vec<Route>, RegistrationError> {
    let mut all = Vec::new();
    for controller in controllers {
        all.extend(routes_for(Arc::clone(controller))?);
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::routing::{Params, Router};

    struct Items {
        label: &'static str,
    }

    impl Controller for Items {
        fn base_path(&self) -> &str {
            "/api/items/"
        }

        fn routes(self: Arc<Self>) -> Vec<RouteDef> {
            let this = Arc::clone(&self);
            vec![
                RouteDef::new(Method::Get, "~", |_: Request, _: Params| async { "list" }),
                RouteDef::new(Method::Get, ":group/:id", move |_: Request, p: Params| {
                    let label = this.label;
                    async move {
                        format!("{label}:{}:{}", p.arg(0).unwrap_or(""), p.arg(1).unwrap_or(""))
                    }
                })
                .param("id")
                .param("group"),
            ]
        }
    }

    struct Broken;

    impl Controller for Broken {
        fn base_path(&self) -> &str {
            "api/broken"
        }

        fn routes(self: Arc<Self>) -> Vec<RouteDef> {
            vec![RouteDef::new(Method::Get, ":id", |_: Request, _: Params| async { "" }).param("name")]
        }
    }

    struct Index;

    impl Controller for Index {
        fn base_path(&self) -> &str {
            ""
        }

        fn routes(self: Arc<Self>) -> Vec<RouteDef> {
            vec![RouteDef::new(Method::Get, "~", |_: Request, _: Params| async { "index" })]
        }
    }

    #[tokio::test]
    async fn empty_base_with_tilde_serves_root() {
        let router = Router::new().mount(Arc::new(Index)).unwrap();
        let req = Request::new("GET", "/");
        let res = router.handle(Method::Get, req.path()).unwrap().call(req.clone()).await;
        assert_eq!(res.body(), b"index");
    }

    #[test]
    fn base_and_sub_path_are_joined() {
        let routes = routes_for(Arc::new(Items { label: "x" })).unwrap();
        let patterns: Vec<_> = routes.iter().map(|r| r.pattern().to_string()).collect();
        assert_eq!(patterns, vec!["api/items", "api/items/:group/:id"]);
    }

    #[test]
    fn unbound_parameter_fails_registration() {
        let err = routes_for(Arc::new(Broken)).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnboundParameter {
                route: "GET api/broken/:id".into(),
                param: "name".into(),
            }
        );
    }

    #[test]
    fn register_stops_at_first_broken_controller() {
        let controllers: Vec<Arc<dyn Controller>> =
            vec![Arc::new(Items { label: "x" }), Arc::new(Broken)];
        assert!(register(&controllers).is_err());

        let good: Vec<Arc<dyn Controller>> = vec![Arc::new(Items { label: "x" })];
        assert_eq!(register(&good).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn handler_receives_declared_params_in_declaration_order() {
        let router = Router::new().mount(Arc::new(Items { label: "inv" })).unwrap();
        let req = Request::new("GET", "/api/items/tools/7");
        let res = router.handle(Method::Get, req.path()).unwrap().call(req.clone()).await;
        assert_eq!(res.body(), b"inv:7:tools");
    }
}

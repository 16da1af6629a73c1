//! Request dispatcher.
//!
//! [`Api`] is the seam between whatever receives HTTP requests and the
//! route table: one already-parsed [`Request`] in, one [`Response`] out.
//! The bundled [`Server`](crate::Server) drives it over hyper; tests and
//! embedders call [`Api::dispatch`] directly.

use tracing::{Instrument, debug, info_span};

use crate::config::CorsConfig;
use crate::error::ApiError;
use crate::method::{Method, UnknownMethod};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::routing::Router;
use crate::status::Status;

/// A route table plus the response policy applied around it.
pub struct Api {
    router: Router,
    cors: CorsConfig,
}

impl Api {
    pub fn new(router: Router) -> Self {
        Self { router, cors: CorsConfig::default() }
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one request.
    ///
    /// `OPTIONS` is answered as a CORS preflight and never routed. A method
    /// string that names no known method gets `405`; a request no route
    /// claims gets `404`. Every response carries the allow-origin header.
    pub async fn dispatch(&self, req: Request) -> Response {
        let span = info_span!("request", method = %req.method(), path = %req.path());
        async move {
            if req.method() == Method::Options.as_str() {
                return self.preflight();
            }

            let response = self.route(req).await;
            debug!(status = response.status_code(), "request handled");
            self.allow_origin(response)
        }
        .instrument(span)
        .await
    }

    async fn route(&self, req: Request) -> Response {
        let method = match req.method().parse::<Method>() {
            Ok(method) => method,
            Err(UnknownMethod(method)) => return ApiError::MethodNotAllowed(method).into_response(),
        };

        match self.router.handle(method, req.path()) {
            Some(matched) => matched.call(req).await,
            None => ApiError::not_found(format!("No route for {method} {}", req.path())).into_response(),
        }
    }

    fn preflight(&self) -> Response {
        let cors = &self.cors;
        let mut builder = Response::builder()
            .status(Status::NoContent)
            .header("access-control-allow-origin", &cors.allow_origin)
            .header("access-control-allow-methods", &cors.allow_methods)
            .header("access-control-allow-headers", &cors.allow_headers)
            .header("access-control-max-age", &cors.max_age.to_string());
        if !cors.expose_headers.is_empty() {
            builder = builder.header("access-control-expose-headers", &cors.expose_headers);
        }
        builder.no_body()
    }

    fn allow_origin(&self, response: Response) -> Response {
        let response = response.with_header("access-control-allow-origin", &self.cors.allow_origin);
        if self.cors.expose_headers.is_empty() {
            response
        } else {
            response.with_header("access-control-expose-headers", &self.cors.expose_headers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Params;
    use crate::response::Json;
    use serde_json::{Value, json};

    async fn speed(_: Request, _: Params) -> Json<Value> {
        Json(json!({ "speed": 1.0 }))
    }

    async fn fail(_: Request, _: Params) -> Result<Status, ApiError> {
        Err(ApiError::internal("host state is inconsistent"))
    }

    fn api() -> Api {
        Api::new(
            Router::new()
                .on(Method::Get, "api/time/speed", speed)
                .on(Method::Get, "api/broken", fail),
        )
    }

    fn body(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn routed_request_gets_allow_origin() {
        let res = api().dispatch(Request::new("GET", "/api/time/speed")).await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(body(&res), json!({ "speed": 1.0 }));
        assert_eq!(res.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[tokio::test]
    async fn routing_miss_names_method_and_path() {
        let res = api().dispatch(Request::new("PUT", "/api/time/speed")).await;
        assert_eq!(res.status_code(), 404);
        assert_eq!(body(&res)["message"], "No route for PUT /api/time/speed");
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn unknown_method_is_not_allowed() {
        let res = api().dispatch(Request::new("BREW", "/api/time/speed")).await;
        assert_eq!(res.status_code(), 405);
        assert!(body(&res)["message"].as_str().unwrap().contains("BREW"));
    }

    #[tokio::test]
    async fn lowercase_method_is_unknown() {
        let res = api().dispatch(Request::new("get", "/api/time/speed")).await;
        assert_eq!(res.status_code(), 405);
    }

    #[tokio::test]
    async fn preflight_is_never_routed() {
        let api = api().with_cors(CorsConfig {
            allow_origin: "http://localhost:3000".into(),
            expose_headers: "Location".into(),
            ..CorsConfig::default()
        });
        let res = api.dispatch(Request::new("OPTIONS", "/nowhere")).await;
        assert_eq!(res.status_code(), 204);
        assert!(res.body().is_empty());
        assert_eq!(res.header("access-control-allow-origin"), Some("http://localhost:3000"));
        assert_eq!(res.header("access-control-allow-methods"), Some("GET, PUT, POST, DELETE"));
        assert_eq!(res.header("access-control-allow-headers"), Some("Content-Type"));
        assert_eq!(res.header("access-control-max-age"), Some("1728000"));
        assert_eq!(res.header("access-control-expose-headers"), Some("Location"));
    }

    #[tokio::test]
    async fn handler_error_is_mapped_to_status() {
        let res = api().dispatch(Request::new("GET", "/api/broken")).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(body(&res)["message"], "host state is inconsistent");
    }
}

//! # fascia
//!
//! A REST façade over a live, mutable object graph owned by some host
//! process (a game, a simulation, an editor). The host keeps its own types;
//! fascia routes requests to controllers and translates host objects to and
//! from JSON through registered strategies.
//!
//! ## Pieces
//!
//! - Ordered routing: `:name` captures one segment, `**name` captures the
//!   rest of the path, first registered match wins. See [`routing`].
//! - Controllers declare a base path and their routes; registration checks
//!   every bound parameter before anything is served. See [`Controller`].
//! - Strategy-based JSON: per-kind getter/setter tables, composable across
//!   a wrapper and its payload. See [`translate`].
//! - Host marshaling: handlers send closures to the host's own execution
//!   context and await the result. See [`host`].
//! - Graceful shutdown: SIGTERM / Ctrl-C drains in-flight requests.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fascia::{
//!     Api, ApiError, Config, Controller, HostHandle, Json, Method, Params, Request,
//!     RouteDef, Router, Server,
//! };
//! use serde_json::{Value, json};
//!
//! struct Clock { speed: f32 }
//!
//! struct TimeController { host: HostHandle<Clock> }
//!
//! impl Controller for TimeController {
//!     fn base_path(&self) -> &str { "api/time" }
//!
//!     fn routes(self: Arc<Self>) -> Vec<RouteDef> {
//!         vec![RouteDef::new(Method::Get, "speed", move |_: Request, _: Params| {
//!             let this = Arc::clone(&self);
//!             async move {
//!                 let speed = this.host.run(|c: &mut Clock| c.speed).await?;
//!                 Ok::<_, ApiError>(Json(json!({ "speed": speed })))
//!             }
//!         })]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let (host, queue) = fascia::host::channel();
//!     tokio::spawn(queue.run(Clock { speed: 1.0 }));
//!
//!     let router = Router::new().mount(Arc::new(TimeController { host }))?;
//!     let api = Api::new(router).with_cors(config.cors.clone());
//!     Server::bind(config.listen_addr()?).serve(api).await?;
//!     Ok(())
//! }
//! ```

mod app;
mod config;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod server;
mod status;

pub mod host;
pub mod routing;
pub mod translate;

pub use app::Api;
pub use config::{Config, CorsConfig};
pub use error::{ApiError, Error, ErrorBody, RegistrationError};
pub use handler::Handler;
pub use host::{HostHandle, HostQueue};
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use routing::{Controller, Params, Route, RouteDef, Router, match_path};
pub use server::Server;
pub use status::Status;
pub use translate::{JsonObject, JsonTranslator, SetError, Strategy, StrategyRegistry, TranslateError, Translatable};

//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table holds handlers of *different* types in one `Vec<Route>`,
//! so every handler is hidden behind the `dyn ErasedHandler` trait object.
//!
//! ```text
//! async fn get_speed(req: Request, p: Params) -> Json<Value> { … }
//!        ↓ Router::on(Method::Get, "api/time/speed", get_speed)
//! get_speed.into_boxed_handler()                   ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_speed))                   ← stored as BoxedHandler
//!        ↓  (controller routes add a BindingHandler around it)
//! handler.call(req, params)  at request time       ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_speed(req, p).await.into_response() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::routing::Params;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, params: Params) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any function or closure with the shape:
///
/// ```text
/// async fn name(req: Request, params: Params) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Params) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, params: Params) -> BoxFuture {
        let fut = (self.0)(req, params);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Narrows the captured parameters to the ones a controller route declared,
/// in declaration order, before calling the inner handler.
///
/// Registration has already checked that every declared name is captured
/// by the pattern, so binding never drops a declared parameter.
pub(crate) struct BindingHandler {
    pub(crate) declared: Vec<String>,
    pub(crate) inner: BoxedHandler,
}

impl ErasedHandler for BindingHandler {
    fn call(&self, req: Request, params: Params) -> BoxFuture {
        self.inner.call(req, params.bind(&self.declared))
    }
}

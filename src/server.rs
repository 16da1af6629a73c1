//! HTTP listener and graceful shutdown.
//!
//! Accepts connections, converts each hyper request into a [`Request`] and
//! hands it to [`Api::dispatch`]. On shutdown the server stops accepting,
//! lets every in-flight connection finish, then returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::Api;
use crate::error::{ApiError, Error};
use crate::request::Request;
use crate::response::IntoResponse;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when it starts serving.
    ///
    /// ```rust,no_run
    /// use fascia::{Config, Server};
    /// # fn main() -> Result<(), fascia::Error> {
    /// let server = Server::bind(Config::default().listen_addr()?);
    /// # Ok(()) }
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Serves `api` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, api: Api) -> Result<(), Error> {
        self.serve_with_shutdown(api, shutdown_signal()).await
    }

    /// Serves `api` until `shutdown` resolves, then drains in-flight
    /// connections.
    pub async fn serve_with_shutdown<F>(self, api: Api, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let api = Arc::new(api);

        info!(addr = %self.addr, routes = api.router().len(), "fascia listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a signal stops accepting even while
                // connections are still queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let api = Arc::clone(&api);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let api = Arc::clone(&api);
                            async move { dispatch(api, req).await }
                        });

                        // HTTP/1.1 or HTTP/2, whichever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("fascia stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Converts one hyper request and dispatches it. Never fails towards hyper:
/// every error becomes a response.
async fn dispatch(
    api: Arc<Api>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let response = match into_request(req).await {
        Ok(req) => api.dispatch(req).await,
        Err(e) => e.into_response(),
    };
    Ok(response.into_inner())
}

async fn into_request(req: hyper::Request<Incoming>) -> Result<Request, ApiError> {
    let (parts, body) = req.into_parts();

    // Kept encoded: the matcher decodes after splitting, so `%2F` stays
    // inside its segment.
    let path = parts.uri.path();
    if urlencoding::decode(path).is_err() {
        return Err(ApiError::bad_request(format!("path `{path}` is not valid UTF-8 once decoded")));
    }

    let mut request = Request::new(parts.method.as_str(), path);

    if let Some(query) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            request = request.with_query(key, value);
        }
    }

    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => warn!(header = %name, "dropping non-ASCII header value"),
        }
    }

    let body = body
        .collect()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read request body: {e}")))?
        .to_bytes();

    Ok(request.with_body(body.to_vec()))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or Ctrl-C (Ctrl-C only on non-Unix platforms).
///
/// If a handler cannot be installed that signal is logged and ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}

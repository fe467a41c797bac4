//! The HTTP/1 host around a [`Pipeline`].
//!
//! The server owns everything the pipeline does not: the socket, the
//! body-size limit, the request timeout, `/health`, `/metrics` and
//! graceful shutdown. Everything else goes through the pipeline.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{header, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use trailhead_core::{DeploymentMode, NormalizedError};
use trailhead_middleware::{Pipeline, Response, ResponseExt};
use trailhead_telemetry::MetricsRegistry;

use crate::error::ServerError;
use crate::health::HealthCheck;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Network-layer limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind address.
    pub addr: SocketAddr,
    /// Applies to body collection and to the pipeline separately.
    pub request_timeout: Duration,
    /// How long to wait for connections to drain.
    pub shutdown_timeout: Duration,
    /// Largest accepted body.
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerSettings {
    /// Sets the bind address.
    #[must_use]
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the body-size limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}

/// The Trailhead HTTP server.
///
/// ```rust,ignore
/// let server = Server::new(pipeline, ServerSettings::default());
/// server.run().await?;
/// ```
pub struct Server {
    settings: ServerSettings,
    pipeline: Arc<Pipeline>,
    health: HealthCheck,
    metrics: Option<MetricsRegistry>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("settings", &self.settings)
            .field("pipeline", &self.pipeline)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Hosts a pipeline.
    #[must_use]
    pub fn new(pipeline: Pipeline, settings: ServerSettings) -> Self {
        Self {
            settings,
            pipeline: Arc::new(pipeline),
            health: HealthCheck::default(),
            metrics: None,
        }
    }

    /// Serves `/metrics` from this registry. `None` leaves it unrouted.
    #[must_use]
    pub fn with_metrics(mut self, registry: Option<MetricsRegistry>) -> Self {
        self.metrics = registry;
        self
    }

    /// Replaces the health reporter.
    #[must_use]
    pub fn with_health(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }

    /// Network settings.
    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// The hosted pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn mode(&self) -> DeploymentMode {
        self.pipeline.mode()
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.settings.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` fires, then waits
    /// up to the shutdown timeout for open connections.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            mode = %self.mode(),
            stages = ?self.pipeline.stage_names(),
            "server listening"
        );

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let guard = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.serve_connection(stream, shutdown).await {
                                tracing::debug!(%remote_addr, error = %e, "connection error");
                            }
                            drop(guard);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let timeout = server.settings.shutdown_timeout;
        tracing::info!(
            active = tracker.active_connections(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining connections"
        );

        tokio::select! {
            () = tracker.drained() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn serve_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let server = Arc::clone(self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle(request).await) }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => result,
            () = shutdown.recv() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        }
    }

    /// Answers one request: built-in endpoints first, then the pipeline.
    pub async fn handle<B>(&self, request: http::Request<B>) -> Response
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if request.method() == Method::GET {
            match request.uri().path() {
                "/health" => return Response::json(StatusCode::OK, &self.health.status()),
                "/metrics" => {
                    if let Some(registry) = &self.metrics {
                        return metrics_response(registry.render());
                    }
                }
                _ => {}
            }
        }

        let (parts, body) = request.into_parts();
        let limited = Limited::new(body, self.settings.max_body_bytes);

        let bytes = match tokio::time::timeout(self.settings.request_timeout, limited.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!(limit = self.settings.max_body_bytes, "request body too large");
                return self.transport_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Payload Too Large",
                    "request entity too large",
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read request body");
                return self.transport_error(
                    StatusCode::BAD_REQUEST,
                    "Bad Request",
                    "request body could not be read",
                );
            }
            Err(_) => {
                tracing::warn!("request body collection timed out");
                return self.transport_error(
                    StatusCode::REQUEST_TIMEOUT,
                    "Request Timeout",
                    "request body was not received in time",
                );
            }
        };

        let request = http::Request::from_parts(parts, Full::new(bytes));
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match tokio::time::timeout(self.settings.request_timeout, self.pipeline.handle(request)).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(%method, %path, "request timed out in pipeline");
                self.transport_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service Unavailable",
                    "request timed out",
                )
            }
        }
    }

    /// Failures that happen before the pipeline runs still use the
    /// uniform error body.
    fn transport_error(&self, status: StatusCode, title: &str, message: &str) -> Response {
        let body = NormalizedError::new(message)
            .with_status(status)
            .with_title(title)
            .with_errors(vec![message.to_string()])
            .into_body(self.mode());
        Response::json(status, &body)
    }
}

fn metrics_response(text: String) -> Response {
    let mut response = http::Response::new(Full::new(Bytes::from(text)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

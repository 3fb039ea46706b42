//! # JSON Invocation Bridge
//!
//! A tower middleware that shares one endpoint between native gRPC clients and plain
//! JSON over HTTP.
//!
//! ## How it works
//!
//! Every request is classified before it reaches the wrapped gRPC service:
//!
//! * **`GET`**: renders the browsing page, embedding [`Registry::documentation_json`].
//! * **`POST /<service>/<method>`** over HTTP/1: a JSON call. The body is decoded into
//!   the method's request type, the registered handler is invoked and its response is
//!   encoded back to JSON.
//! * **Anything else** (notably `content-type: application/grpc`): forwarded untouched
//!   to the wrapped service.
//!
//! ## Responses of JSON calls
//!
//! * Routing failures (missing path segments, unknown service or method) are answered
//!   with `400 Bad Request` and a plain text body.
//! * Every other failure is answered with `200 OK` and `{"error": "<message>"}`, the
//!   same status as a successful call. Callers inspect the envelope themselves.
//!
//! ## Example
//!
//! ```rust,ignore
//! let (registry, routes) = builder.build();
//! let layer = JsonBridgeLayer::new(Arc::new(registry), |json: &str| render_page(json));
//!
//! tonic::transport::Server::builder()
//!     .accept_http1(true)
//!     .layer(layer)
//!     .add_routes(routes)
//!     .serve(addr)
//!     .await?;
//! ```
use crate::{
    BoxError,
    grpc::handler::DecodeFn,
    message::{self, DecodeError, EncodeError, JsonFormat, encode_json},
    registry::{Registry, routing_key},
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderValue, Method, StatusCode, Version, header::CONTENT_TYPE};
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tonic::body::Body;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// The default limit of a JSON request body, the same as tonic's default decoding limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

const GRPC_CONTENT_TYPE: &str = "application/grpc";

/// Renders the browsing page.
///
/// The markup itself is up to the application; the bridge only provides the
/// documentation as a JSON object (`{service: {method: {Name, TypeIn, ExampleIn}}}`).
pub trait PageRenderer: Send + Sync {
    fn render(&self, documentation_json: &str) -> String;
}

impl<F> PageRenderer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn render(&self, documentation_json: &str) -> String {
        self(documentation_json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Requests with a larger body fail with a transport error.
    pub max_body_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Errors of a single JSON call.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("No path segments")]
    MissingPathSegments,
    #[error("No service for {0}")]
    UnknownService(String),
    #[error("No method for {0}")]
    UnknownMethod(String),
    #[error("Failed to read request body: {0}")]
    Transport(#[source] axum::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{}", .0.message())]
    Handler(tonic::Status),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl InvokeError {
    /// Whether the request could not be routed to a method at all.
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            InvokeError::MissingPathSegments
                | InvokeError::UnknownService(_)
                | InvokeError::UnknownMethod(_)
        )
    }
}

/// Installs a [`JsonBridge`] in front of a gRPC service.
#[derive(Clone)]
pub struct JsonBridgeLayer {
    registry: Arc<Registry>,
    renderer: Arc<dyn PageRenderer>,
    config: BridgeConfig,
}

impl JsonBridgeLayer {
    pub fn new(registry: Arc<Registry>, renderer: impl PageRenderer + 'static) -> Self {
        Self {
            registry,
            renderer: Arc::new(renderer),
            config: BridgeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }
}

impl<S> Layer<S> for JsonBridgeLayer {
    type Service = JsonBridge<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JsonBridge {
            inner,
            registry: Arc::clone(&self.registry),
            renderer: Arc::clone(&self.renderer),
            config: self.config,
        }
    }
}

/// Serves JSON calls and the browsing page, forwarding everything else to `S`.
#[derive(Clone)]
pub struct JsonBridge<S> {
    inner: S,
    registry: Arc<Registry>,
    renderer: Arc<dyn PageRenderer>,
    config: BridgeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Browse,
    Invoke,
    Forward,
}

impl<S, B> Service<http::Request<B>> for JsonBridge<S>
where
    S: Service<http::Request<B>, Response = http::Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = http::Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        match classify(&request) {
            Route::Browse => {
                let response = browse(&self.registry, self.renderer.as_ref());
                Box::pin(async move { Ok(response) })
            }
            Route::Invoke => {
                let registry = Arc::clone(&self.registry);
                let config = self.config;
                Box::pin(async move { Ok(invoke(&registry, request, config).await) })
            }
            Route::Forward => {
                // The clone is not ready yet, keep the service we polled
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                Box::pin(inner.call(request))
            }
        }
    }
}

fn classify<B>(request: &http::Request<B>) -> Route {
    let is_grpc = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(GRPC_CONTENT_TYPE));

    match *request.method() {
        _ if is_grpc => Route::Forward,
        Method::GET => Route::Browse,
        Method::POST if request.version() < Version::HTTP_2 => Route::Invoke,
        _ => Route::Forward,
    }
}

fn browse(registry: &Registry, renderer: &dyn PageRenderer) -> http::Response<Body> {
    match registry.documentation_json() {
        Ok(json) => response(StatusCode::OK, "text/html; charset=utf-8", renderer.render(&json)),
        Err(err) => response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain; charset=utf-8",
            format!("Failed to encode documentation: {err}"),
        ),
    }
}

/// Runs one JSON call and turns its outcome into an HTTP response.
pub async fn invoke<B>(
    registry: &Registry,
    request: http::Request<B>,
    config: BridgeConfig,
) -> http::Response<Body>
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    match call_method(registry, request, config).await {
        Ok(json) => response(StatusCode::OK, "application/json", json),
        Err(err) if err.is_routing() => {
            debug!(error = %err, "Rejected JSON call");
            response(
                StatusCode::BAD_REQUEST,
                "text/plain; charset=utf-8",
                err.to_string(),
            )
        }
        Err(err) => {
            warn!(error = %err, "JSON call failed");
            let envelope = serde_json::json!({ "error": err.to_string() });
            response(StatusCode::OK, "application/json", envelope.to_string())
        }
    }
}

async fn call_method<B>(
    registry: &Registry,
    request: http::Request<B>,
    config: BridgeConfig,
) -> Result<String, InvokeError>
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (service, method) = parse_path(request.uri().path())?;

    if registry.service(&service).is_none() {
        return Err(InvokeError::UnknownService(service));
    }
    let registered = registry
        .method(&service, &method)
        .ok_or_else(|| InvokeError::UnknownMethod(method.clone()))?;

    debug!(route = %routing_key(&service, &method), "Invoking method");

    let body = axum::body::Body::new(request.into_body());
    let bytes = axum::body::to_bytes(body, config.max_body_bytes)
        .await
        .map_err(InvokeError::Transport)?;

    let mut decoded = registered.request_type.new_instance();
    registered.request_type.decode_json(&mut decoded, &bytes)?;

    let decode: DecodeFn = Box::new(move |target| message::merge(target, &decoded));
    let output = (registered.handler)(decode)
        .await
        .map_err(InvokeError::Handler)?;

    Ok(encode_json(&output, JsonFormat::COMPACT)?)
}

/// Splits `/<service>/<method>[/...]`. Extra segments are ignored.
fn parse_path(path: &str) -> Result<(String, String), InvokeError> {
    let mut segments = path.trim_start_matches('/').split('/');

    match (segments.next(), segments.next()) {
        (Some(service), Some(method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service.to_string(), method.to_string()))
        }
        _ => Err(InvokeError::MissingPathSegments),
    }
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> http::Response<Body> {
    let mut response = http::Response::new(Body::new(axum::body::Body::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

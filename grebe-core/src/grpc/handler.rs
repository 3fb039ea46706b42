//! # Method Handlers
//!
//! A [`MethodHandler`] is the uniform entry point for one unary method of a registered
//! service. The bridge hands it a [`DecodeFn`]; the handler builds its own empty request
//! instance, asks the callback to fill it, and then calls the service implementation
//! in-process with the [`DynamicCodec`].
use super::codec::DynamicCodec;
use crate::message::DecodeError;
use futures_util::future::BoxFuture;
use http::uri::{InvalidUri, PathAndQuery};
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::{convert::Infallible, str::FromStr, sync::Arc};
use tonic::{Status, body::Body, client::Grpc};
use tower::util::BoxCloneSyncService;

/// A type-erased tonic server (e.g. a generated `FooServiceServer<T>`).
pub type ServiceImpl = BoxCloneSyncService<http::Request<Body>, http::Response<Body>, Infallible>;

/// Fills the handler's request instance. Called exactly once per invocation.
pub type DecodeFn = Box<dyn FnOnce(&mut DynamicMessage) -> Result<(), DecodeError> + Send>;

/// The uniform calling convention of every registered method.
pub type MethodHandler =
    Arc<dyn Fn(DecodeFn) -> BoxFuture<'static, Result<DynamicMessage, Status>> + Send + Sync>;

/// Builds the handler of a unary `method`, bound to `implementation`.
///
/// # Returns
///
/// * `Ok(MethodHandler)` - The handler.
/// * `Err(InvalidUri)` - The service and method names do not form a valid HTTP path.
pub fn unary_handler(
    implementation: ServiceImpl,
    method: MethodDescriptor,
) -> Result<MethodHandler, InvalidUri> {
    let path = http_path(&method)?;

    let handler = move |decode: DecodeFn| -> BoxFuture<'static, Result<DynamicMessage, Status>> {
        let mut request = DynamicMessage::new(method.input());
        let decoded = decode(&mut request);

        let mut client = Grpc::new(implementation.clone());
        let codec = DynamicCodec::new(method.input(), method.output());
        let path = path.clone();

        Box::pin(async move {
            decoded.map_err(|e| Status::invalid_argument(e.to_string()))?;

            client
                .ready()
                .await
                .map_err(|e| Status::unavailable(format!("Service was not ready: {e}")))?;

            let response = client
                .unary(tonic::Request::new(request), path, codec)
                .await?;

            Ok(response.into_inner())
        })
    };

    Ok(Arc::new(handler))
}

fn http_path(method: &MethodDescriptor) -> Result<PathAndQuery, InvalidUri> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    PathAndQuery::from_str(&path)
}

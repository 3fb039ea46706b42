//! # Grebe Core
//!
//! `grebe-core` exposes tonic gRPC services through a second transport: plain JSON over
//! HTTP, on the same port, without a second implementation of the business logic.
//!
//! Nothing here knows the request or response types at compile time. Everything is
//! driven by `prost-reflect` descriptors.
//!
//! ## Key Components
//!
//! * **[`registry::RegistryBuilder`]:** The startup-time, single-writer table. Registering a
//!   tonic server makes each of its unary methods routable as `<service>/<method>` and
//!   documents it with an example request.
//! * **[`bridge::JsonBridgeLayer`]:** A tower layer that answers `GET` with the browsing
//!   page, `POST /<service>/<method>` with a JSON call, and forwards native gRPC traffic
//!   to the wrapped service.
//! * **[`populate::populate`]:** Builds a structurally complete example of any message type.
//! * **[`message`]:** The JSON facade over `prost_reflect::DynamicMessage`.
//!
//! ## Internal calling convention
//!
//! * **[`grpc::handler`]:** Every method is invoked through the same handler signature,
//!   which calls the registered server in-process.
//! * **[`grpc::codec::DynamicCodec`]:** An implementation of `tonic::codec::Codec` for
//!   `DynamicMessage` values.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod bridge;
pub mod grpc;
pub mod message;
pub mod populate;
pub mod registry;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

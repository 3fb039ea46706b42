//! # In-process gRPC calls
//!
//! This module contains the calling convention shared by every registered method.
//!
//! The JSON bridge never sees generated request/response structs. Instead, each method
//! gets a [`handler::MethodHandler`] that calls the registered tonic server in-process,
//! through `tonic::client::Grpc`, exchanging `prost_reflect::DynamicMessage` values
//! that the [`codec::DynamicCodec`] encodes to (and decodes from) Protobuf bytes.
pub mod codec;
pub mod handler;

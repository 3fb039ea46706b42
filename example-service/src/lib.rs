//! # Example Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide generated gRPC servers
//! and a descriptor set for the `grebe` demo binary and the `grebe-core` integration tests.
//! It is not intended for production use.

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/example.rs"));
}

pub use pb::alternate_service_server::{AlternateService, AlternateServiceServer};
pub use pb::example_service_server::{ExampleService, ExampleServiceServer};
pub use pb::tree_service_server::{TreeService, TreeServiceServer};

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");

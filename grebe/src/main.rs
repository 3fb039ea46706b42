//! # Grebe Entry Point
//!
//! Hosts the demo services on a single port:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs
//!    the `tracing` subscriber.
//! 2. **Registration**: Registers every demo service with a
//!    [`grebe_core::registry::RegistryBuilder`].
//! 3. **Serving**: Runs a tonic server that accepts HTTP/1, with the JSON bridge installed
//!    in front of the native gRPC routes.
mod cli;
mod example;
mod page;

use clap::Parser;
use cli::Cli;
use example::{AlternateServiceImpl, Echo, ExampleServiceImpl, TreeServiceImpl};
use example_service::{
    AlternateServiceServer, ExampleServiceServer, FILE_DESCRIPTOR_SET, TreeServiceServer,
};
use grebe_core::bridge::{BridgeConfig, JsonBridgeLayer};
use grebe_core::prost_reflect::DescriptorPool;
use grebe_core::registry::RegistryBuilder;
use page::PageTemplate;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("grebe=info,grebe_core=info")),
        )
        .init();

    let pool = DescriptorPool::decode(FILE_DESCRIPTOR_SET)?;
    let echo = Echo::new(pool.clone());

    let example = ExampleServiceServer::new(ExampleServiceImpl(echo.clone()));
    let alternate = AlternateServiceServer::new(AlternateServiceImpl(echo.clone()));
    let tree = TreeServiceServer::new(TreeServiceImpl(echo));

    let mut builder = RegistryBuilder::new();
    builder
        .register_from_pool(&pool, example)?
        .register_from_pool(&pool, alternate)?
        .register_from_pool(&pool, tree)?;

    let (registry, routes) = builder.build();
    info!(services = ?registry.services(), "Registered services");

    let layer = JsonBridgeLayer::new(Arc::new(registry), PageTemplate::new(args.template))
        .with_config(BridgeConfig {
            max_body_bytes: args.max_body_bytes,
        });

    let addr = SocketAddr::new(args.host, args.port);
    info!(%addr, tls = false, "Serving gRPC and JSON");

    Server::builder()
        .accept_http1(true)
        .layer(layer)
        .add_routes(routes)
        .serve(addr)
        .await?;

    Ok(())
}

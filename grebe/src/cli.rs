//! # CLI
//!
//! This module defines the command-line interface of `grebe` using `clap`.
//!
//! Every option can also be set through a `GREBE_*` environment variable.
use grebe_core::bridge::DEFAULT_MAX_BODY_BYTES;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "grebe",
    version,
    about = "Browse and call gRPC services with plain JSON over HTTP"
)]
pub struct Cli {
    /// Port shared by native gRPC clients and JSON clients
    #[arg(short, long, env = "GREBE_PORT", default_value_t = 9090)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "GREBE_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// HTML template of the browsing page.
    ///
    /// The file is read again on every page load, so it can be edited while the server runs.
    /// The embedded template is used when it is not set or cannot be read.
    #[arg(long, env = "GREBE_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Largest accepted JSON request body, in bytes
    #[arg(long, env = "GREBE_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

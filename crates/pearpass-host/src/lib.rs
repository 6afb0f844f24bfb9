// ============================================
// File: crates/pearpass-host/src/lib.rs
// ============================================
//! # PearPass Host - Channel Integration Layer
//!
//! ## Creation Reason
//! Glues the secure-channel core into the desktop host process: the RPC
//! dispatcher the native-messaging loop feeds, host configuration, and
//! logging initialisation.
//!
//! ## Main Functionality
//! - [`rpc`]: The request dispatcher over a [`pearpass_core::Core`]
//! - [`config`]: TOML host configuration with serde defaults
//! - [`init_logging`]: tracing-subscriber setup with env-filter override
//!
//! ## Usage
//! ```no_run
//! use std::sync::Arc;
//! use pearpass_core::kv::{MemoryCache, MemoryKv};
//! use pearpass_core::Core;
//! use pearpass_host::rpc::RpcDispatcher;
//!
//! # async fn wire_up() {
//! pearpass_host::init_logging("info");
//!
//! let core = Arc::new(Core::new(
//!     Arc::new(MemoryKv::new()),
//!     Arc::new(MemoryCache::new()),
//! ));
//! let dispatcher = RpcDispatcher::new(core, true);
//!
//! let reply = dispatcher
//!     .handle(&serde_json::json!({ "request": "resetPairing" }))
//!     .await;
//! # let _ = reply;
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The native-messaging transport (framing, process spawning) lives in
//!   the desktop app, not here; this crate stops at JSON values in and out
//!
//! ## Last Modified
//! v0.1.0 - Initial host integration

#![warn(clippy::all)]

pub mod config;
pub mod rpc;

pub use config::HostConfig;
pub use rpc::RpcDispatcher;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialises the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` applies. Safe to call more
/// than once (later calls are no-ops).
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

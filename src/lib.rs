//! # Mission Control
//!
//! Operator console client for a remote gateway.
//!
//! ## Features
//!
//! - **Gateway RPC:** one WebSocket, a `connect` handshake that tolerates
//!   repeated server challenges, then correlated request/response calls
//! - **Deadlines:** per-connection and per-request timeouts with clean
//!   cancellation
//! - **Dashboard snapshot:** status, health, sessions, jobs and channels in
//!   one refresh
//! - **Layered config:** defaults, JSON5/TOML file, environment

pub mod config;
pub mod error;
pub mod gateway;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::GatewayClient;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");

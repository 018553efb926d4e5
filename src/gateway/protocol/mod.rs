//! Gateway Protocol - WebSocket-based operator RPC
//!
//! This module defines the frames exchanged between the console and the
//! gateway.
//!
//! ## Protocol Overview
//!
//! - **JSON-based messages** over WebSocket, one object per text frame
//! - **Request-response pattern** correlated by unique string IDs
//! - **Handshake** via a `connect` request, possibly re-requested by the
//!   server through `connect.challenge` events
//! - **Authentication** via an opaque token in the handshake
//!
//! ## Message Types
//!
//! - `req`: Client-initiated requests
//! - `res`: Server responses (`ok` plus `payload` or `error`)
//! - `event`: Server-pushed events

pub mod schema;
pub mod types;

pub use schema::{
    describe_error, EventFrame, GatewayFrame, RequestFrame, ResponseError, ResponseFrame,
    PROTOCOL_VERSION,
};
pub use types::*;

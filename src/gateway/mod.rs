//! Gateway module - WebSocket RPC client for the operator console
//!
//! The console talks to a remote gateway over one persistent WebSocket:
//! a `connect` handshake first, then correlated request/response calls.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                   GatewayClient                    │
//! │        connect() · request() · close()             │
//! └───────┬──────────────────┬─────────────────┬───────┘
//!         │                  │                 │
//!         ▼                  ▼                 ▼
//!  ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//!  │  Handshake  │   │ PendingCalls │   │  Transport  │
//!  │ Controller  │   │  (by id)     │   │ (WebSocket) │
//!  └─────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mission_control::gateway::GatewayClient;
//!
//! # async fn example() -> mission_control::Result<()> {
//! let client = GatewayClient::new("https://gateway.example.com", Some("token"));
//! client.connect().await?;
//! let status = client.request("status", serde_json::json!({})).await?;
//! println!("{}", status);
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod handshake;
pub mod pending;
pub mod protocol;
pub mod snapshot;
pub mod transport;
pub mod url;

pub use client::{ClientOptions, GatewayClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use handshake::{HandshakeController, HandshakeState};
pub use pending::PendingCalls;
pub use protocol::{
    ClientDescriptor, ConnectParams, EventFrame, GatewayFrame, RequestFrame, ResponseFrame,
    PROTOCOL_VERSION,
};
pub use snapshot::{
    ChannelItem, DashboardSnapshot, GatewayHealth, HealthStatus, JobItem, JobStatus, SessionItem,
    SessionState,
};
pub use transport::{Connector, Transport, TransportEvent, WsConnector};
pub use url::{parse_ws_url, to_ws_url};

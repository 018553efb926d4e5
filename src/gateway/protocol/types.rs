//! Gateway protocol types
//!
//! Handshake parameters and request types for the gateway methods the
//! console calls.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use super::schema::PROTOCOL_VERSION;

// ============================================================================
// Handshake
// ============================================================================

/// Method name of the handshake call
pub const CONNECT_METHOD: &str = "connect";

/// Role requested by this client
pub const OPERATOR_ROLE: &str = "operator";

/// Capability scopes requested by an operator console
pub const OPERATOR_SCOPES: [&str; 5] = [
    "operator.read",
    "operator.write",
    "operator.pairing",
    "operator.approvals",
    "operator.admin",
];

/// Client descriptor sent in the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDescriptor {
    /// Client identifier
    pub id: String,
    /// Client version
    pub version: String,
    /// Platform name
    pub platform: String,
    /// Client mode
    pub mode: String,
}

impl Default for ClientDescriptor {
    fn default() -> Self {
        ClientDescriptor {
            id: "openclaw-android".to_string(),
            version: "dev".to_string(),
            platform: "android".to_string(),
            mode: "webchat".to_string(),
        }
    }
}

/// Credentials attached to the handshake
#[derive(Debug, Clone, Serialize)]
pub struct ConnectAuth {
    /// Opaque gateway token
    #[serde(serialize_with = "expose_token")]
    pub token: SecretString,
}

fn expose_token<S: Serializer>(token: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(token.expose_secret())
}

/// Parameters of the `connect` call
///
/// The content is fixed for the lifetime of a connection; challenge resends
/// reuse it unchanged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest protocol version accepted
    pub min_protocol: u32,
    /// Highest protocol version accepted
    pub max_protocol: u32,
    /// Who is connecting
    pub client: ClientDescriptor,
    /// Requested role
    pub role: String,
    /// Requested capability scopes
    pub scopes: Vec<String>,
    /// Client capabilities
    pub caps: Vec<String>,
    /// Credentials, omitted when no token is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConnectAuth>,
}

impl ConnectParams {
    /// Build operator handshake parameters
    ///
    /// An empty token is treated as no token.
    pub fn operator(client: ClientDescriptor, token: Option<&SecretString>) -> Self {
        let auth = token
            .filter(|t| !t.expose_secret().trim().is_empty())
            .map(|t| ConnectAuth { token: t.clone() });

        ConnectParams {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client,
            role: OPERATOR_ROLE.to_string(),
            scopes: OPERATOR_SCOPES.iter().map(|s| s.to_string()).collect(),
            caps: Vec::new(),
            auth,
        }
    }

    /// Serialize for the request frame
    pub fn to_value(&self) -> serde_json::Value {
        // Only strings and integers; serialization cannot fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Console methods
// ============================================================================

/// Method names the console calls
pub mod methods {
    /// Gateway status
    pub const STATUS: &str = "status";
    /// Gateway health
    pub const HEALTH: &str = "health";
    /// List sessions
    pub const SESSIONS_LIST: &str = "sessions.list";
    /// List scheduled jobs
    pub const CRON_LIST: &str = "cron.list";
    /// Channel account status
    pub const CHANNELS_STATUS: &str = "channels.status";
}

/// List sessions request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsListRequest {
    /// Include global sessions
    pub include_global: bool,
    /// Include sessions with unknown origin
    pub include_unknown: bool,
    /// Maximum results
    pub limit: u32,
}

impl Default for SessionsListRequest {
    fn default() -> Self {
        SessionsListRequest {
            include_global: true,
            include_unknown: true,
            limit: 100,
        }
    }
}

/// List scheduled jobs request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronListRequest {
    /// Include disabled jobs
    pub include_disabled: bool,
}

impl Default for CronListRequest {
    fn default() -> Self {
        CronListRequest {
            include_disabled: true,
        }
    }
}

/// Channel status request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsStatusRequest {
    /// Actively probe each channel
    pub probe: bool,
    /// Probe timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ChannelsStatusRequest {
    fn default() -> Self {
        ChannelsStatusRequest {
            probe: false,
            timeout_ms: 5000,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event names
pub mod events {
    /// Server asks for the connect envelope (again)
    pub const CONNECT_CHALLENGE: &str = "connect.challenge";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_shape() {
        let token = SecretString::from("tok-123".to_string());
        let params = ConnectParams::operator(ClientDescriptor::default(), Some(&token)).to_value();

        assert_eq!(params["minProtocol"], 3);
        assert_eq!(params["maxProtocol"], 3);
        assert_eq!(params["client"]["id"], "openclaw-android");
        assert_eq!(params["client"]["mode"], "webchat");
        assert_eq!(params["role"], "operator");
        assert_eq!(params["scopes"].as_array().unwrap().len(), 5);
        assert_eq!(params["scopes"][4], "operator.admin");
        assert_eq!(params["caps"], serde_json::json!([]));
        assert_eq!(params["auth"]["token"], "tok-123");
    }

    #[test]
    fn test_connect_params_without_token() {
        let params = ConnectParams::operator(ClientDescriptor::default(), None).to_value();
        assert!(params.get("auth").is_none());

        let blank = SecretString::from("  ".to_string());
        let params = ConnectParams::operator(ClientDescriptor::default(), Some(&blank)).to_value();
        assert!(params.get("auth").is_none());
    }

    #[test]
    fn test_token_not_in_debug() {
        let token = SecretString::from("tok-123".to_string());
        let params = ConnectParams::operator(ClientDescriptor::default(), Some(&token));
        assert!(!format!("{:?}", params).contains("tok-123"));
    }

    #[test]
    fn test_console_requests() {
        let json = serde_json::to_value(SessionsListRequest::default()).unwrap();
        assert_eq!(json, serde_json::json!({"includeGlobal": true, "includeUnknown": true, "limit": 100}));

        let json = serde_json::to_value(ChannelsStatusRequest::default()).unwrap();
        assert_eq!(json, serde_json::json!({"probe": false, "timeoutMs": 5000}));
    }
}

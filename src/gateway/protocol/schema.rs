//! Gateway protocol schema
//!
//! Defines the wire format for gateway messages: one JSON object per
//! WebSocket text frame, discriminated by its `type` field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Protocol version spoken by this client (both bounds of the negotiation)
pub const PROTOCOL_VERSION: u32 = 3;

/// Message used when a failed response carries no usable error text
pub const GENERIC_FAILURE: &str = "Gateway request failed";

/// Gateway frame - Top-level message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    /// Request from client
    #[serde(rename = "req")]
    Request(RequestFrame),
    /// Response from server
    #[serde(rename = "res")]
    Response(ResponseFrame),
    /// Event pushed by server
    #[serde(rename = "event")]
    Event(EventFrame),
}

impl GatewayFrame {
    /// Decode one inbound text frame
    ///
    /// Anything that is not a well-formed envelope yields
    /// [`Error::MalformedFrame`]; callers discard those.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::MalformedFrame(e.to_string()))
    }

    /// Encode to the text sent on the wire
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Request frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation identifier, unique per connection
    pub id: String,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(default)]
    pub params: Value,
}

impl RequestFrame {
    /// Create a new request frame
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        RequestFrame {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Wrap into a top-level frame
    pub fn into_frame(self) -> GatewayFrame {
        GatewayFrame::Request(self)
    }
}

/// Response frame
///
/// Matched to its request by `id` only; the method is not echoed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Request ID this responds to
    pub id: String,
    /// Outcome flag; an absent flag counts as success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Result (success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Error (failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ResponseFrame {
    /// Create a success response
    pub fn success(id: impl Into<String>, payload: Value) -> Self {
        ResponseFrame {
            id: id.into(),
            ok: Some(true),
            payload: Some(payload),
            error: None,
        }
    }

    /// Create an error response
    pub fn failure(id: impl Into<String>, error: ResponseError) -> Self {
        ResponseFrame {
            id: id.into(),
            ok: Some(false),
            payload: None,
            error: Some(error),
        }
    }

    /// Whether the server reported success
    pub fn is_ok(&self) -> bool {
        self.ok != Some(false)
    }

    /// Split into the payload or a human-readable failure message
    pub fn into_outcome(self) -> std::result::Result<Value, String> {
        if self.is_ok() {
            Ok(self.payload.unwrap_or(Value::Null))
        } else {
            Err(describe_error(self.error.as_ref()))
        }
    }
}

/// Error carried by a failed response
///
/// Servers send either a bare string or a structured object. Shapes that
/// match neither still decode, so a response is never lost because of its
/// error field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseError {
    /// Plain message
    Text(String),
    /// Structured error with diagnostics
    Structured(StructuredError),
    /// Anything else
    Unknown(Value),
}

/// Structured error object
///
/// Each field decodes on its own: a readable `message` survives a
/// `details` value of the wrong shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredError {
    /// Human-readable message
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Diagnostic details
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Diagnostic details attached to a structured error
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Server-side request identifier for support lookups
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<String>,
}

/// Decode a field, treating a value of the wrong shape as absent
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl ResponseError {
    /// Create a structured error
    pub fn structured(message: impl Into<String>, request_id: Option<String>) -> Self {
        ResponseError::Structured(StructuredError {
            message: Some(message.into()),
            details: request_id.map(|id| ErrorDetails {
                request_id: Some(id),
            }),
        })
    }
}

/// Render a response error as a single line for the operator
///
/// The diagnostic request identifier is appended when present.
pub fn describe_error(error: Option<&ResponseError>) -> String {
    let (message, request_id) = match error {
        Some(ResponseError::Text(text)) => (text.as_str(), None),
        Some(ResponseError::Structured(err)) => (
            err.message.as_deref().unwrap_or(GENERIC_FAILURE),
            err.details.as_ref().and_then(|d| d.request_id.as_deref()),
        ),
        Some(ResponseError::Unknown(_)) | None => (GENERIC_FAILURE, None),
    };

    match request_id {
        Some(id) => format!("{} (requestId: {})", message, id),
        None => message.to_string(),
    }
}

/// Event frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name
    pub event: String,
    /// Event data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Server sequence number, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    /// Create a new event
    pub fn new(event: impl Into<String>) -> Self {
        EventFrame {
            event: event.into(),
            payload: None,
            seq: None,
        }
    }

    /// Whether this is the server asking for the connect envelope again
    pub fn is_challenge(&self) -> bool {
        self.event == super::types::events::CONNECT_CHALLENGE
    }
}

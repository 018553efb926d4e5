//! Gateway URL normalization

use url::Url;

use crate::error::{Error, Result};

/// Turn whatever the operator typed into a WebSocket URL
///
/// `ws://` and `wss://` pass through, `http://` and `https://` map to their
/// WebSocket counterparts, and a bare host defaults to `wss://`.
pub fn to_ws_url(input: &str) -> String {
    let trimmed = input.trim();

    if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("wss://{}", trimmed)
    }
}

/// Normalize and parse, rejecting input that is not a usable endpoint
pub fn parse_ws_url(input: &str) -> Result<Url> {
    if input.trim().is_empty() {
        return Err(Error::InvalidInput("Gateway URL is empty".to_string()));
    }

    let normalized = to_ws_url(input);
    let url = Url::parse(&normalized)
        .map_err(|e| Error::InvalidInput(format!("Invalid gateway URL {}: {}", normalized, e)))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidInput(format!("Gateway URL has no host: {}", normalized)));
    }

    Ok(url)
}

/// Whether the URL points at this machine
pub fn is_local(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]" | "::1"))
}

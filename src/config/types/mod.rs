//! Configuration types module

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::gateway::protocol::ClientDescriptor;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway connection
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Client descriptor sent in the handshake
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from environment variables and files
    ///
    /// Precedence, lowest first:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. Environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway URL (`ws://`, `wss://`, `http(s)://` or bare host)
    #[serde(default)]
    pub url: String,
    /// Gateway token; read from file or env, never written back
    #[serde(skip_serializing, default = "default_secret")]
    pub token: SecretString,
    /// Deadline for socket open plus handshake
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Deadline for each request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            url: String::new(),
            token: default_secret(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl GatewayConfig {
    /// Token, if one is configured
    pub fn token(&self) -> Option<SecretString> {
        let token = self.token.expose_secret().trim();
        if token.is_empty() {
            None
        } else {
            Some(SecretString::from(token.to_string()))
        }
    }
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_connect_timeout() -> Duration {
    crate::gateway::DEFAULT_CONNECT_TIMEOUT
}

fn default_request_timeout() -> Duration {
    crate::gateway::DEFAULT_REQUEST_TIMEOUT
}

/// Client descriptor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client identifier
    #[serde(default = "default_client_id")]
    pub id: String,
    /// Client version
    #[serde(default = "default_client_version")]
    pub version: String,
    /// Platform name
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Client mode
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            id: default_client_id(),
            version: default_client_version(),
            platform: default_platform(),
            mode: default_mode(),
        }
    }
}

impl ClientConfig {
    /// Descriptor for the handshake
    pub fn descriptor(&self) -> ClientDescriptor {
        ClientDescriptor {
            id: self.id.clone(),
            version: self.version.clone(),
            platform: self.platform.clone(),
            mode: self.mode.clone(),
        }
    }
}

fn default_client_id() -> String {
    ClientDescriptor::default().id
}

fn default_client_version() -> String {
    ClientDescriptor::default().version
}

fn default_platform() -> String {
    ClientDescriptor::default().platform
}

fn default_mode() -> String {
    ClientDescriptor::default().mode
}

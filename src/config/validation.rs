//! Configuration validation
//!
//! Validates configuration and reports issues.

use super::types::Config;
use crate::gateway::url::{is_local, parse_ws_url};

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_gateway_url(config, result);
    result = validate_timeouts(config, result);

    result
}

fn validate_gateway_url(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.gateway.url.trim().is_empty() {
        return result.with_error(
            ValidationIssue::new("gateway.url", "No gateway URL configured")
                .with_suggestion("Set MISSION_CONTROL_GATEWAY_URL or gateway.url in config"),
        );
    }

    let url = match parse_ws_url(&config.gateway.url) {
        Ok(url) => url,
        Err(e) => {
            return result.with_error(ValidationIssue::new("gateway.url", e.to_string()));
        }
    };

    if url.scheme() == "ws" && !is_local(&url) {
        result = result.with_warning(
            ValidationIssue::new(
                "gateway.url",
                format!("Unencrypted connection to remote host {}", url.host_str().unwrap_or_default()),
            )
            .with_suggestion("Use wss:// or https:// for gateways outside this machine"),
        );
    }

    if config.gateway.token().is_none() {
        result = result.with_warning(
            ValidationIssue::new("gateway.token", "No gateway token configured")
                .with_suggestion("Set MISSION_CONTROL_GATEWAY_TOKEN if the gateway requires auth"),
        );
    }

    result
}

fn validate_timeouts(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.gateway.connect_timeout.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "gateway.connect_timeout",
            "Connect timeout must be greater than zero",
        ));
    }
    if config.gateway.request_timeout.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "gateway.request_timeout",
            "Request timeout must be greater than zero",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = validate_config(&config);

        // No URL is the one hard error in a default config
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "gateway.url");
    }

    #[test]
    fn test_validate_complete_config() {
        let mut config = Config::default();
        config.gateway.url = "https://gw.example.com".to_string();
        config.gateway.token = SecretString::from("t".to_string());

        let result = validate_config(&config);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_warnings_and_errors() {
        let mut config = Config::default();
        config.gateway.url = "http://gw.example.com".to_string();
        config.gateway.request_timeout = Duration::ZERO;

        let result = validate_config(&config);
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "gateway.request_timeout");
        assert_eq!(result.warnings.len(), 2);

        config.gateway.url = "ws://127.0.0.1:18789".to_string();
        config.gateway.request_timeout = Duration::from_secs(1);
        let result = validate_config(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }
}

//! Configuration module
//!
//! - types/mod.rs: Configuration types (Config, GatewayConfig, ClientConfig)
//! - io.rs: Configuration file location, loading and saving, env overrides
//! - validation.rs: Configuration validation

mod io;
mod types;
mod validation;

pub use types::{ClientConfig, Config, GatewayConfig};

pub use io::{
    apply_env_overrides, apply_overrides_from, config_dir, config_path, load_config,
    load_config_from_path, save_config, ENV_CONFIG_DIR, ENV_CONFIG_FILE, ENV_CONNECT_TIMEOUT,
    ENV_GATEWAY_TOKEN, ENV_GATEWAY_URL, ENV_REQUEST_TIMEOUT,
};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};

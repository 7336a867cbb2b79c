//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use crate::app_config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    load_with_env(env_source())
}

/// Environment layer: `PARLEY_STORE__TTL_SECONDS` -> `store.ttl_seconds`
fn env_source() -> Environment {
    Environment::with_prefix("PARLEY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_with_env(env: Environment) -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Local overrides (optional)
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        .add_source(env)
        .build()
        .context("Failed to build configuration")?;

    let app: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    app.store
        .validate()
        .context("Invalid store configuration")?;
    Ok(app)
}

mod types;

pub use types::*;

use crate::{Error, Result};
use std::env;
use std::path::Path;
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub async fn load() -> Result<GatewayConfig> {
    let explicit_path = env::var("CONFIG_PATH").ok();
    let config_path = explicit_path
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if explicit_path.is_some() || Path::new(&config_path).exists() {
        debug!("Loading configuration from: {}", config_path);
        load_file(&config_path).await?
    } else {
        debug!("No configuration file found, using defaults");
        GatewayConfig::default()
    };

    apply_overrides(&mut config, |key| env::var(key).ok())?;
    validate(&config)?;

    Ok(config)
}

pub async fn load_file(path: &str) -> Result<GatewayConfig> {
    let config_str = tokio::fs::read_to_string(path).await?;
    let config: GatewayConfig = serde_yaml::from_str(&config_str)?;
    Ok(config)
}

/// Applies `SERVER_PORT`, `CHAT_CORE_URL` and `LOG_LEVEL` on top of the file values.
/// Empty values are ignored.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(port) = lookup("SERVER_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("SERVER_PORT is not a valid port: '{port}'")))?;
    }

    if let Some(url) = lookup("CHAT_CORE_URL") {
        config.upstream.base_url = url;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.server.logs.level = level;
    }

    Ok(())
}

pub fn validate(config: &GatewayConfig) -> Result<()> {
    if config.upstream.base_url.trim().is_empty() {
        return Err(Error::config("upstream base_url must not be empty"));
    }
    if config.upstream.timeout_secs == 0 {
        return Err(Error::config("upstream timeout_secs must be greater than zero"));
    }
    if config.bridge.max_in_flight == 0 {
        return Err(Error::config("bridge max_in_flight must be greater than zero"));
    }
    if config.bridge.unit_timeout_secs == 0 {
        return Err(Error::config("bridge unit_timeout_secs must be greater than zero"));
    }
    if config.bridge.write_timeout_secs == 0 {
        return Err(Error::config("bridge write_timeout_secs must be greater than zero"));
    }
    if config.bridge.max_message_bytes == 0 {
        return Err(Error::config("bridge max_message_bytes must be greater than zero"));
    }
    Ok(())
}

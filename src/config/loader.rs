//! Configuration loader for YAML files
//!
//! `load_config` is the startup path: parse, apply environment overrides,
//! normalize, validate. `load_config_from_str` skips the environment so
//! tests stay deterministic.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AppError;

use super::types::{AccountConfig, AppConfig};

/// Load configuration from a YAML file, then apply environment overrides
///
/// # Errors
/// File not found, YAML parse error, malformed override, or validation failure.
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use copytrade_monitor::config::load_config;
///
/// let config = load_config(Path::new("config.yaml"))?;
/// ```
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut config: AppConfig = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!("YAML parse error in '{}': {}", path.display(), e))
    })?;

    apply_env_overrides(&mut config)?;
    config.normalize();
    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string. Environment overrides are not applied.
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    let mut config: AppConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {}", e)))?;

    config.normalize();
    config.validate()?;

    Ok(config)
}

/// Apply environment variable overrides on top of the file values
///
/// | Variable | Field |
/// |----------|-------|
/// | `FETCH_INTERVAL` | `monitor.fetch_interval_secs` |
/// | `TOO_OLD_TIMESTAMP` | `monitor.stale_window_hours` |
/// | `REQUEST_TIMEOUT_MS` | `api.request_timeout_ms` |
/// | `ENABLE_15MIN_UPDOWN_TRADES` | `filters.enable_15m_updown` |
/// | `USER_ADDRESSES` | appended as standard accounts |
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), AppError> {
    if let Some(v) = env_number("FETCH_INTERVAL")? {
        config.monitor.fetch_interval_secs = v;
    }
    if let Some(v) = env_number("TOO_OLD_TIMESTAMP")? {
        config.monitor.stale_window_hours = v;
    }
    if let Some(v) = env_number("REQUEST_TIMEOUT_MS")? {
        config.api.request_timeout_ms = v;
    }
    if let Ok(v) = std::env::var("ENABLE_15MIN_UPDOWN_TRADES") {
        config.filters.enable_15m_updown = parse_flag(&v);
    }
    if let Ok(raw) = std::env::var("USER_ADDRESSES") {
        for address in parse_account_list(&raw)? {
            let exists = config
                .accounts
                .iter()
                .any(|a| a.address.eq_ignore_ascii_case(&address));
            if !exists {
                config.accounts.push(AccountConfig::standard(&address));
            }
        }
    }
    Ok(())
}

/// Parse a comma-separated list or a JSON array of addresses
pub fn parse_account_list(raw: &str) -> Result<Vec<String>, AppError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        let list: Vec<String> = serde_json::from_str(trimmed).map_err(|e| {
            AppError::Config(format!("USER_ADDRESSES is not a valid JSON array: {}", e))
        })?;
        return Ok(list
            .into_iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect());
    }

    Ok(trimmed
        .split(',')
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("Invalid {}: '{}' is not a number", name, v))),
        _ => Ok(None),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

// ============================================================================
// Tests
// ============================================================================

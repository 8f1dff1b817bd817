//! Configuration types for the monitor
//!
//! Loaded from YAML, validated once at startup, then handed to the
//! scheduler by value. Nothing here is mutated after load.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::adapters::DEFAULT_DATA_API_BASE;
use crate::error::AppError;

/// Default fast-cycle staleness threshold (15 minutes)
pub const DEFAULT_STALENESS_THRESHOLD_SECS: u64 = 900;

/// Upper bound for `stale_window_hours` (one year)
pub const MAX_STALE_WINDOW_HOURS: u64 = 24 * 365;

/// Upper bound for `bootstrap_lookback_minutes` (one year)
pub const MAX_BOOTSTRAP_LOOKBACK_MINUTES: u64 = MAX_STALE_WINDOW_HOURS * 60;

// ============================================================================
// Enums
// ============================================================================

/// How a monitored account's events are handled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Persisted to the ledger for the execution consumer
    #[default]
    Standard,
    /// Short-lived markets: streamed immediately, never persisted
    FastCycle,
}

impl std::fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryKind::Standard => write!(f, "standard"),
            CategoryKind::FastCycle => write!(f, "fast_cycle"),
        }
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One monitored account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountConfig {
    /// `0x` + 40 hex characters; normalized to lowercase on load
    pub address: String,
    /// Display name used in log lines
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: CategoryKind,
    /// Only meaningful for `fast_cycle` accounts
    #[serde(default)]
    pub staleness_threshold_secs: Option<u64>,
}

impl AccountConfig {
    pub fn standard(address: &str) -> Self {
        Self {
            address: address.to_string(),
            name: None,
            category: CategoryKind::Standard,
            staleness_threshold_secs: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_address(&self.address) {
            return Err(AppError::Config(format!(
                "Invalid account address '{}': expected 0x followed by 40 hex characters",
                self.address
            )));
        }

        if let Some(threshold) = self.staleness_threshold_secs {
            if threshold == 0 {
                return Err(AppError::Config(format!(
                    "Account '{}': staleness_threshold_secs must be > 0",
                    self.address
                )));
            }
            if self.category != CategoryKind::FastCycle {
                tracing::warn!(
                    address = %self.address,
                    "staleness_threshold_secs is ignored for standard accounts"
                );
            }
        }

        Ok(())
    }
}

/// Polling and classification parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between poll cycles
    pub fetch_interval_secs: u64,
    /// Events older than this are dropped
    pub stale_window_hours: u64,
    /// Accounts fetched concurrently per batch
    pub batch_size: usize,
    /// How far back bootstrap reconciles history. Never less than the stale
    /// window in effect: a shorter value is raised to `stale_window_hours * 60`.
    pub bootstrap_lookback_minutes: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 1,
            stale_window_hours: 24,
            batch_size: 10,
            bootstrap_lookback_minutes: 1440,
        }
    }
}

/// Sub-kind filters for micro-interval "Up or Down" markets.
/// Both are off by default: such events are dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub enable_15m_updown: bool,
    pub enable_5m_updown: bool,
}

/// Upstream data API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub data_api_base: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            data_api_base: DEFAULT_DATA_API_BASE.to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl AppConfig {
    /// Lowercase every address so partition names and lookups are stable
    pub fn normalize(&mut self) {
        for account in &mut self.accounts {
            account.address = account.address.trim().to_lowercase();
        }
    }

    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.accounts.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one account".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            account.validate()?;
            if !seen.insert(account.address.to_lowercase()) {
                return Err(AppError::Config(format!(
                    "Duplicate account address: {}",
                    account.address
                )));
            }
        }

        if self.monitor.fetch_interval_secs == 0 {
            return Err(AppError::Config(
                "monitor.fetch_interval_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.stale_window_hours < 1
            || self.monitor.stale_window_hours > MAX_STALE_WINDOW_HOURS
        {
            return Err(AppError::Config(format!(
                "monitor.stale_window_hours must be between 1 and {} (got {})",
                MAX_STALE_WINDOW_HOURS, self.monitor.stale_window_hours
            )));
        }

        if self.monitor.bootstrap_lookback_minutes > MAX_BOOTSTRAP_LOOKBACK_MINUTES {
            return Err(AppError::Config(format!(
                "monitor.bootstrap_lookback_minutes must be <= {} (got {})",
                MAX_BOOTSTRAP_LOOKBACK_MINUTES, self.monitor.bootstrap_lookback_minutes
            )));
        }

        if self.monitor.batch_size == 0 {
            return Err(AppError::Config(
                "monitor.batch_size must be >= 1".to_string(),
            ));
        }

        if self.api.request_timeout_ms < 1000 {
            return Err(AppError::Config(format!(
                "api.request_timeout_ms must be >= 1000 (got {})",
                self.api.request_timeout_ms
            )));
        }

        if self.api.data_api_base.trim().is_empty() {
            return Err(AppError::Config(
                "api.data_api_base cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// `0x` followed by exactly 40 hex digits
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Unit Tests
// ============================================================================

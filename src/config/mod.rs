//! Configuration
//!
//! - `config.yaml` types and validation (`AppConfig`, `AccountConfig`, ...)
//! - YAML loading with environment overrides (`load_config`)
//! - Ledger backend selection from the environment (`LedgerConfig`)
//! - Runtime tunables with environment overrides (`constants`)

pub mod constants;
mod ledger;
mod loader;
mod types;

pub use ledger::{LedgerConfig, LedgerConfigError, SupabaseConfig};
pub use loader::{apply_env_overrides, load_config, load_config_from_str, parse_account_list};
pub use types::{
    is_valid_address, AccountConfig, ApiConfig, AppConfig, CategoryKind, FilterConfig,
    MonitorConfig, DEFAULT_STALENESS_THRESHOLD_SECS, MAX_BOOTSTRAP_LOOKBACK_MINUTES,
    MAX_STALE_WINDOW_HOURS,
};

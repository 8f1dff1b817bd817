//! Runtime tunables
//!
//! Values that are not part of `config.yaml` but may need adjusting per
//! deployment. Each reads an environment variable and falls back to a default.

use std::time::Duration;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Channels
// =============================================================================

/// Capacity of the detected-notice stream (default: 256)
///
/// Environment variable: `NOTICE_CHANNEL_CAPACITY`
pub fn notice_channel_capacity() -> usize {
    env_or("NOTICE_CHANNEL_CAPACITY", 256)
}

/// Capacity of the fast-cycle fresh-trade stream (default: 256)
///
/// Environment variable: `FRESH_TRADE_CHANNEL_CAPACITY`
pub fn fresh_trade_channel_capacity() -> usize {
    env_or("FRESH_TRADE_CHANNEL_CAPACITY", 256)
}

/// Capacity of the snapshot fault stream (default: 64)
///
/// Environment variable: `SNAPSHOT_FAULT_CHANNEL_CAPACITY`
pub fn snapshot_fault_channel_capacity() -> usize {
    env_or("SNAPSHOT_FAULT_CHANNEL_CAPACITY", 64)
}

// =============================================================================
// Ledger & Shutdown
// =============================================================================

/// Startup connection attempts before running degraded (default: 3)
///
/// Environment variable: `LEDGER_CONNECT_ATTEMPTS`
pub fn ledger_connect_attempts() -> u32 {
    env_or("LEDGER_CONNECT_ATTEMPTS", 3)
}

/// Grace period for in-flight work after a stop signal (default: 2 seconds)
///
/// Environment variable: `SHUTDOWN_GRACE_SECS`
pub fn shutdown_grace_period() -> Duration {
    Duration::from_secs(env_or("SHUTDOWN_GRACE_SECS", 2))
}

/// Positions listed per account in the startup overview (default: 5)
///
/// Environment variable: `OVERVIEW_TOP_POSITIONS`
pub fn overview_top_positions() -> usize {
    env_or("OVERVIEW_TOP_POSITIONS", 5)
}

/// Print all runtime tunables (startup log)
pub fn log_configuration() {
    tracing::info!("=== Runtime Configuration ===");
    tracing::info!("Channels:");
    tracing::info!("  - Notice capacity: {}", notice_channel_capacity());
    tracing::info!("  - Fresh trade capacity: {}", fresh_trade_channel_capacity());
    tracing::info!("  - Snapshot fault capacity: {}", snapshot_fault_channel_capacity());
    tracing::info!("Ledger:");
    tracing::info!("  - Connect attempts: {}", ledger_connect_attempts());
    tracing::info!("Shutdown:");
    tracing::info!("  - Grace period: {:?}", shutdown_grace_period());
    tracing::info!("=============================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn test_default_values() {
        std::env::remove_var("SHUTDOWN_GRACE_SECS");
        std::env::remove_var("LEDGER_CONNECT_ATTEMPTS");
        std::env::remove_var("NOTICE_CHANNEL_CAPACITY");

        assert_eq!(shutdown_grace_period(), Duration::from_secs(2));
        assert_eq!(ledger_connect_attempts(), 3);
        assert_eq!(notice_channel_capacity(), 256);
    }

    #[test]
    #[serial(env)]
    fn test_env_override() {
        std::env::set_var("LEDGER_CONNECT_ATTEMPTS", "5");
        assert_eq!(ledger_connect_attempts(), 5);

        std::env::set_var("LEDGER_CONNECT_ATTEMPTS", "many");
        assert_eq!(ledger_connect_attempts(), 3);

        std::env::remove_var("LEDGER_CONNECT_ATTEMPTS");
    }
}

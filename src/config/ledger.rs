//! Ledger backend configuration
//!
//! Selects the persistence backend and loads Supabase credentials from
//! environment variables.

use thiserror::Error;
use tracing::info;

use crate::core::logging::SanitizedValue;

/// Errors for ledger configuration
#[derive(Debug, Error)]
pub enum LedgerConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid Supabase URL format: {0}")]
    InvalidUrl(String),

    #[error("Unknown ledger backend: {0} (expected 'supabase' or 'memory')")]
    UnknownBackend(String),
}

/// Supabase (PostgREST) connection settings
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Supabase project URL (e.g., <https://xxx.supabase.co>)
    pub url: String,
    /// Supabase anonymous key for API access
    pub anon_key: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &SanitizedValue::new(&self.anon_key))
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

/// Which ledger the process persists to
#[derive(Debug, Clone)]
pub enum LedgerConfig {
    Supabase(SupabaseConfig),
    /// Non-durable; for dry runs
    Memory,
}

impl LedgerConfig {
    /// Load the ledger configuration from environment variables
    ///
    /// - `LEDGER_BACKEND`: "supabase" (default) or "memory"
    /// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: required for the supabase backend
    ///
    /// Unlike optional analytics persistence, the ledger is mandatory: missing
    /// or placeholder credentials are an error.
    pub fn from_env() -> Result<Self, LedgerConfigError> {
        let backend = std::env::var("LEDGER_BACKEND")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_else(|_| "supabase".to_string());

        match backend.as_str() {
            "memory" => {
                info!("Ledger backend: in-memory (entries are lost on exit)");
                Ok(Self::Memory)
            }
            "supabase" | "" => {
                let url = match std::env::var("SUPABASE_URL") {
                    Ok(u) if !u.is_empty() && !u.contains("your-project") => u,
                    _ => return Err(LedgerConfigError::MissingEnvVar("SUPABASE_URL".to_string())),
                };

                if !is_valid_url(&url) {
                    return Err(LedgerConfigError::InvalidUrl(url));
                }

                let anon_key = std::env::var("SUPABASE_ANON_KEY")
                    .map_err(|_| LedgerConfigError::MissingEnvVar("SUPABASE_ANON_KEY".to_string()))?;

                if anon_key.is_empty() || anon_key.contains("your-anon-key") {
                    return Err(LedgerConfigError::MissingEnvVar(
                        "SUPABASE_ANON_KEY (contains placeholder)".to_string(),
                    ));
                }

                info!(url = %url, "Supabase ledger configuration loaded");
                Ok(Self::Supabase(SupabaseConfig::new(&url, &anon_key)))
            }
            other => Err(LedgerConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Hosted projects must use TLS; plain HTTP is only accepted for a local stack
fn is_valid_url(url: &str) -> bool {
    url.starts_with("https://")
        || url.starts_with("http://localhost")
        || url.starts_with("http://127.0.0.1")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_ledger_env() {
        env::remove_var("LEDGER_BACKEND");
        env::remove_var("SUPABASE_URL");
        env::remove_var("SUPABASE_ANON_KEY");
    }

    #[test]
    #[serial(env)]
    fn test_error_when_env_not_set() {
        clear_ledger_env();

        let result = LedgerConfig::from_env();
        assert!(matches!(result, Err(LedgerConfigError::MissingEnvVar(v)) if v == "SUPABASE_URL"));
    }

    #[test]
    #[serial(env)]
    fn test_memory_backend() {
        clear_ledger_env();
        env::set_var("LEDGER_BACKEND", "Memory");

        let result = LedgerConfig::from_env();
        assert!(matches!(result, Ok(LedgerConfig::Memory)));

        clear_ledger_env();
    }

    #[test]
    #[serial(env)]
    fn test_unknown_backend() {
        clear_ledger_env();
        env::set_var("LEDGER_BACKEND", "mongo");

        let result = LedgerConfig::from_env();
        assert!(matches!(result, Err(LedgerConfigError::UnknownBackend(_))));

        clear_ledger_env();
    }

    #[test]
    #[serial(env)]
    fn test_placeholder_url_rejected() {
        clear_ledger_env();
        env::set_var("SUPABASE_URL", "https://your-project.supabase.co");
        env::set_var("SUPABASE_ANON_KEY", "real-key");

        assert!(LedgerConfig::from_env().is_err());

        clear_ledger_env();
    }

    #[test]
    #[serial(env)]
    fn test_error_when_url_invalid_format() {
        clear_ledger_env();
        env::set_var("SUPABASE_URL", "http://not-supabase.com");
        env::set_var("SUPABASE_ANON_KEY", "real-key");

        let result = LedgerConfig::from_env();
        assert!(matches!(result, Err(LedgerConfigError::InvalidUrl(_))));

        clear_ledger_env();
    }

    #[test]
    #[serial(env)]
    fn test_error_when_key_missing() {
        clear_ledger_env();
        env::set_var("SUPABASE_URL", "https://test.supabase.co");

        assert!(LedgerConfig::from_env().is_err());

        clear_ledger_env();
    }

    #[test]
    #[serial(env)]
    fn test_success_with_valid_config() {
        clear_ledger_env();
        env::set_var("SUPABASE_URL", "https://test.supabase.co/");
        env::set_var("SUPABASE_ANON_KEY", "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");

        let config = LedgerConfig::from_env().unwrap();
        match config {
            LedgerConfig::Supabase(cfg) => {
                assert_eq!(cfg.url, "https://test.supabase.co");
                assert!(!format!("{:?}", cfg).contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
            }
            LedgerConfig::Memory => panic!("Expected supabase backend"),
        }

        clear_ledger_env();
    }
}

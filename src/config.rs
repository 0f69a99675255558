//! Configuration for the sync engine

use std::env;

/// Engine configuration
///
/// All values have working defaults; `from_env` overrides them from
/// environment variables where set.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Service identifier stamped into (and required of) tokens
    pub service_name: String,
    /// Session lifetime before it is swept as expired
    pub session_ttl_hours: i64,
    /// Validity window for session credentials issued at initialization
    pub session_token_ttl_seconds: u64,
    /// Validity window for field-confidentiality wrap tokens
    pub field_wrap_ttl_seconds: u64,
    /// Interval for the background expired-session sweep
    pub cleanup_interval_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            service_name: "sync-engine".to_string(),
            session_ttl_hours: 24,
            session_token_ttl_seconds: 24 * 60 * 60,
            // Wrapped field values are at-rest protection, not session
            // credentials: one year.
            field_wrap_ttl_seconds: 365 * 24 * 60 * 60,
            cleanup_interval_seconds: 300,
        }
    }
}

impl SyncConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: env::var("SYNC_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            session_ttl_hours: env::var("SYNC_SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_ttl_hours),
            session_token_ttl_seconds: env::var("SYNC_SESSION_TOKEN_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_token_ttl_seconds),
            field_wrap_ttl_seconds: env::var("SYNC_FIELD_WRAP_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.field_wrap_ttl_seconds),
            cleanup_interval_seconds: env::var("SYNC_CLEANUP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval_seconds),
        }
    }
}

//! # Reconciler Configuration
//!
//! Process-wide settings loaded from environment variables.
//!
//! Established once at startup and shared read-only between operations.

use crate::seal::SealingScope;
use crate::reconciler::backoff::ExponentialBackoff;
use std::time::Duration;

/// Reconciler-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Name of the SealedSecrets controller service
    pub controller_name: String,
    /// Namespace of the SealedSecrets controller service
    pub controller_namespace: String,
    /// Apply retries after the first attempt (0 disables retry)
    pub apply_retry_count: u32,
    /// Exponential backoff starting value (milliseconds)
    pub backoff_initial_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Growth factor between consecutive retries
    pub backoff_multiplier: f64,
    /// Timeout applied to every individual network call (seconds)
    pub request_timeout_secs: u64,
    /// Scope the sealed output is bound to
    pub scope: SealingScope,
    /// Seal secrets with no data instead of rejecting them
    pub allow_empty_data: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            controller_namespace: DEFAULT_CONTROLLER_NAMESPACE.to_string(),
            apply_retry_count: DEFAULT_APPLY_RETRY_COUNT,
            backoff_initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            scope: SealingScope::default(),
            allow_empty_data: false,
        }
    }
}

impl ReconcilerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            controller_name: env_var_or_default_str(
                "SEALED_SECRETS_CONTROLLER_NAME",
                DEFAULT_CONTROLLER_NAME,
            ),
            controller_namespace: env_var_or_default_str(
                "SEALED_SECRETS_CONTROLLER_NAMESPACE",
                DEFAULT_CONTROLLER_NAMESPACE,
            ),
            apply_retry_count: env_var_or_default("APPLY_RETRY_COUNT", DEFAULT_APPLY_RETRY_COUNT),
            backoff_initial_ms: env_var_or_default(
                "APPLY_BACKOFF_INITIAL_MS",
                DEFAULT_BACKOFF_INITIAL_MS,
            ),
            backoff_max_ms: env_var_or_default("APPLY_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            request_timeout_secs: env_var_or_default(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            scope: env_var_or_default("SEALING_SCOPE", SealingScope::default()),
            allow_empty_data: env_var_or_default_bool("ALLOW_EMPTY_DATA", false),
        }
    }

    /// Backoff policy for the apply step
    #[must_use]
    pub fn apply_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.backoff_initial_duration(),
            self.backoff_max_duration(),
            self.backoff_multiplier,
        )
        .with_max_retries(self.apply_retry_count)
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_initial_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get per-call network timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_controller_conventions() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.controller_name, "sealed-secrets-controller");
        assert_eq!(config.controller_namespace, "kube-system");
        assert_eq!(config.apply_retry_count, 0);
        assert_eq!(config.backoff_initial_duration(), Duration::from_secs(3));
        assert_eq!(config.backoff_max_duration(), Duration::from_secs(30));
        assert_eq!(config.scope, SealingScope::ClusterWide);
        assert!(!config.allow_empty_data);
    }

    #[test]
    fn test_apply_backoff_uses_configured_bounds() {
        let config = ReconcilerConfig {
            apply_retry_count: 2,
            ..ReconcilerConfig::default()
        };
        let mut backoff = config.apply_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(3)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(4_500)));
        assert_eq!(backoff.next_backoff(), None);
    }
}

//! Application-level configuration loaded from the environment.

use std::{env, time::Duration};

use tracing::warn;

/// Default upper bound for a single persistence call.
const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);
/// Environment variable overriding the storage timeout, in milliseconds.
const STORAGE_TIMEOUT_ENV: &str = "BEAT_ROOMS_STORAGE_TIMEOUT_MS";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Upper bound applied to every call into the match store. Room and
    /// session mutexes stay held while a store call is in flight, so a slow
    /// backend must not be allowed to wedge a room forever.
    pub storage_timeout: Duration,
}

impl AppConfig {
    /// Load the configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let storage_timeout = match env::var(STORAGE_TIMEOUT_ENV) {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(millis) => Duration::from_millis(millis),
                Err(err) => {
                    warn!(
                        var = STORAGE_TIMEOUT_ENV,
                        value = %raw,
                        error = %err,
                        "unparsable storage timeout; using default"
                    );
                    DEFAULT_STORAGE_TIMEOUT
                }
            },
            Err(_) => DEFAULT_STORAGE_TIMEOUT,
        };

        Self { storage_timeout }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }
}

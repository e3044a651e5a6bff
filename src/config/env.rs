//! Environment variable configuration
//!
//! Provides environment variable overrides for the runner configuration.

use std::env;
use std::time::Duration;
use tracing::warn;

/// Environment variable prefix
const ENV_PREFIX: &str = "FTW";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Log readiness timeout from FTW_LOG_START_TIMEOUT_SECONDS
    pub log_start_timeout: Option<Duration>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            log_start_timeout: get_env_secs("LOG_START_TIMEOUT_SECONDS"),
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable as a non-negative, representable number of seconds
fn get_env_secs(name: &str) -> Option<Duration> {
    let raw = get_env(name)?;
    let parsed = raw
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    match parsed {
        Some(duration) => Some(duration),
        None => {
            warn!(
                "Ignoring {}_{}={:?}: expected a non-negative number of seconds",
                ENV_PREFIX, name, raw
            );
            None
        }
    }
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    /// Create a new environment builder
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set the log readiness timeout
    pub fn log_start_timeout(mut self, value: impl Into<String>) -> Self {
        self.vars.push((
            format!("{ENV_PREFIX}_LOG_START_TIMEOUT_SECONDS"),
            value.into(),
        ));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate the same process-wide variable.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.log_start_timeout.is_none());
    }

    #[test]
    fn test_log_start_timeout_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvBuilder::new().log_start_timeout("2.5").apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.log_start_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_invalid_timeout_is_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();

        for raw in ["soon", "-1", "NaN", "inf", "1e300", ""] {
            let _guard = EnvBuilder::new().log_start_timeout(raw).apply_scoped();
            assert_eq!(EnvConfig::load().log_start_timeout, None, "{raw:?}");
        }
    }

    #[test]
    fn test_zero_timeout_is_allowed() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvBuilder::new().log_start_timeout("0").apply_scoped();

        assert_eq!(EnvConfig::load().log_start_timeout, Some(Duration::ZERO));
    }
}

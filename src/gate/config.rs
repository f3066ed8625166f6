//! # Gate Configuration
//!
//! A gate is described by two numbers fixed at construction:
//!
//! ```text
//!     ┌────────────────────────────────────┐
//!     │ max_requests: 5                    │ ← admissions per window
//!     │ window_ms:    60_000               │ ← window length
//!     │                                    │
//!     │ Result: 5 requests per minute,     │
//!     │         counted in fixed windows   │
//!     └────────────────────────────────────┘
//! ```
//!
//! Both must be positive. [`GateConfig::validate`] checks this and every
//! constructor path that accepts untrusted input goes through it.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default admissions per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Default window length: one minute.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Default interval between registry sweeps: five minutes.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 300_000;

/// Invalid gate or registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_requests` was zero, so nothing could ever be admitted.
    #[error("max_requests must be greater than 0")]
    ZeroMaxRequests,

    /// `window_ms` was zero, so every window would already be expired.
    #[error("window_ms must be greater than 0")]
    ZeroWindow,

    /// The sweep driver interval was zero.
    #[error("sweep_interval_ms must be greater than 0")]
    ZeroSweepInterval,

    /// An environment variable was set but could not be parsed.
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// Raw value found in the environment.
        value: String,
    },
}

/// Configuration for a single request gate.
///
/// ## Examples
///
/// ```rust
/// use recipe_gate::GateConfig;
/// use std::time::Duration;
///
/// // The two gates of the recipe app
/// let recipes = GateConfig::recipe_generation();   // 5 per minute
/// let chat = GateConfig::chat();                   // 10 per minute
///
/// // Custom
/// let config = GateConfig::per_minute(30).with_window(Duration::from_secs(30));
/// assert_eq!(config.window_ms, 30_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Admission ceiling per key per window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl GateConfig {
    /// Creates a configuration from raw values. Not validated.
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    /// `requests` admissions per second.
    pub fn per_second(requests: u32) -> Self {
        Self::new(requests, 1_000)
    }

    /// `requests` admissions per minute.
    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, 60_000)
    }

    /// Gate for AI recipe generation: 5 per minute.
    pub fn recipe_generation() -> Self {
        Self::per_minute(5)
    }

    /// Gate for AI chat messages: 10 per minute.
    pub fn chat() -> Self {
        Self::per_minute(10)
    }

    /// Replaces the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window_ms = window.as_millis() as u64;
        self
    }

    /// Replaces the admission ceiling.
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Checks that both values are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        if self.window_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(())
    }

    /// Window length as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Sustained admission rate per second, ignoring boundary bursts.
    pub fn effective_rate_per_second(&self) -> f64 {
        if self.window_ms == 0 {
            0.0
        } else {
            (self.max_requests as f64 * 1000.0) / self.window_ms as f64
        }
    }

    /// Loads `<PREFIX>_MAX_REQUESTS` and `<PREFIX>_WINDOW_MS`.
    ///
    /// Unset variables fall back to `defaults`. A set but unparsable value is
    /// an error, as is a result that fails [`validate`](Self::validate).
    ///
    /// ```rust
    /// use recipe_gate::GateConfig;
    ///
    /// let config = GateConfig::from_env("RECIPE_GATE_DOCTEST", GateConfig::chat()).unwrap();
    /// assert_eq!(config, GateConfig::chat());
    /// ```
    pub fn from_env(prefix: &str, defaults: GateConfig) -> Result<Self, ConfigError> {
        let config = Self {
            max_requests: env_or(&format!("{prefix}_MAX_REQUESTS"), defaults.max_requests)?,
            window_ms: env_or(&format!("{prefix}_WINDOW_MS"), defaults.window_ms)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the application's [`GateRegistry`](crate::GateRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Gate guarding AI recipe generation.
    pub recipe_generation: GateConfig,

    /// Gate guarding AI chat messages.
    pub chat: GateConfig,

    /// Interval used by the sweeper threads, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            recipe_generation: GateConfig::recipe_generation(),
            chat: GateConfig::chat(),
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl RegistryConfig {
    /// Replaces the sweep interval.
    pub fn with_sweep_interval_ms(mut self, ms: u64) -> Self {
        self.sweep_interval_ms = ms;
        self
    }

    /// Validates both gates and the sweep interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recipe_generation.validate()?;
        self.chat.validate()?;
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        Ok(())
    }

    /// Loads the registry configuration from the environment.
    ///
    /// Reads `RECIPE_GATE_RECIPE_*`, `RECIPE_GATE_CHAT_*` and
    /// `RECIPE_GATE_SWEEP_INTERVAL_MS`, falling back to [`Default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            recipe_generation: GateConfig::from_env(
                "RECIPE_GATE_RECIPE",
                defaults.recipe_generation,
            )?,
            chat: GateConfig::from_env("RECIPE_GATE_CHAT", defaults.chat)?,
            sweep_interval_ms: env_or(
                "RECIPE_GATE_SWEEP_INTERVAL_MS",
                defaults.sweep_interval_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(GateConfig::default().validate().is_ok());

        let zero_max = GateConfig::new(0, 1_000);
        assert_eq!(zero_max.validate(), Err(ConfigError::ZeroMaxRequests));

        let zero_window = GateConfig::new(5, 0);
        assert_eq!(zero_window.validate(), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn test_presets() {
        assert_eq!(GateConfig::default(), GateConfig::new(5, 60_000));
        assert_eq!(GateConfig::recipe_generation(), GateConfig::new(5, 60_000));
        assert_eq!(GateConfig::chat(), GateConfig::new(10, 60_000));
        assert_eq!(GateConfig::per_second(3), GateConfig::new(3, 1_000));
    }

    #[test]
    fn test_builders() {
        let config = GateConfig::per_minute(120)
            .with_window(Duration::from_secs(30))
            .with_max_requests(60);

        assert_eq!(config.max_requests, 60);
        assert_eq!(config.window_ms, 30_000);
        assert_eq!(config.window(), Duration::from_secs(30));
        assert_eq!(config.effective_rate_per_second(), 2.0);
    }

    #[test]
    fn test_from_env_uses_defaults_when_unset() {
        let config = GateConfig::from_env("RECIPE_GATE_TEST_UNSET", GateConfig::chat()).unwrap();
        assert_eq!(config, GateConfig::chat());
    }

    #[test]
    fn test_from_env_reads_values() {
        env::set_var("RECIPE_GATE_TEST_READ_MAX_REQUESTS", "7");
        env::set_var("RECIPE_GATE_TEST_READ_WINDOW_MS", " 2500 ");

        let config = GateConfig::from_env("RECIPE_GATE_TEST_READ", GateConfig::default()).unwrap();
        assert_eq!(config, GateConfig::new(7, 2_500));
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        env::set_var("RECIPE_GATE_TEST_BAD_MAX_REQUESTS", "lots");

        let err = GateConfig::from_env("RECIPE_GATE_TEST_BAD", GateConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                name: "RECIPE_GATE_TEST_BAD_MAX_REQUESTS".to_string(),
                value: "lots".to_string(),
            }
        );
    }

    #[test]
    fn test_from_env_rejects_zero() {
        env::set_var("RECIPE_GATE_TEST_ZERO_WINDOW_MS", "0");

        let err = GateConfig::from_env("RECIPE_GATE_TEST_ZERO", GateConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::ZeroWindow);
    }

    #[test]
    fn test_registry_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.sweep_interval_ms, 300_000);
        assert!(config.validate().is_ok());

        let bad = config.with_sweep_interval_ms(0);
        assert_eq!(bad.validate(), Err(ConfigError::ZeroSweepInterval));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::ZeroMaxRequests.to_string(),
            "max_requests must be greater than 0"
        );
        let err = ConfigError::InvalidEnv {
            name: "X".into(),
            value: "y".into(),
        };
        assert_eq!(err.to_string(), "environment variable X has invalid value \"y\"");
    }
}

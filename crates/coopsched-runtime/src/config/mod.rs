//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. File named by `COOP_CONFIG_RS` (compile-time)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use coopsched_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env()
//!     .stack_size(512 * 1024)
//!     .report_stats(true);
//! ```

pub mod defaults;

use std::time::Duration;

use coopsched_core::constants::MIN_STACK_SIZE;
use coopsched_core::env::{env_get, env_get_bool};
use coopsched_core::{kprintln, Priority, SchedError};

/// Runtime configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Usable stack bytes per spawned thread
    pub stack_size: usize,
    /// Priority for threads spawned without one
    pub default_priority: Priority,
    /// Priority of the adopted bootstrap thread
    pub main_priority: Priority,
    /// How long an idle processor sleeps between remote-wake checks
    pub idle_park_timeout: Duration,
    /// Raise the log level to debug at startup
    pub debug_logging: bool,
    /// Print the statistics report when the runtime shuts down
    pub report_stats: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `COOP_STACK_SIZE` - Stack size per thread in bytes
    /// - `COOP_DEFAULT_PRIORITY` - Priority for spawned threads
    /// - `COOP_MAIN_PRIORITY` - Priority of the bootstrap thread
    /// - `COOP_IDLE_PARK_TIMEOUT_MS` - Idle sleep in milliseconds
    /// - `COOP_DEBUG` - Enable debug logging (0/1)
    /// - `COOP_REPORT_STATS` - Print statistics on shutdown (0/1)
    pub fn from_env() -> Self {
        Self {
            stack_size: env_get("COOP_STACK_SIZE", defaults::STACK_SIZE),
            default_priority: Priority::new(env_get(
                "COOP_DEFAULT_PRIORITY",
                defaults::DEFAULT_PRIORITY,
            )),
            main_priority: Priority::new(env_get("COOP_MAIN_PRIORITY", defaults::MAIN_PRIORITY)),
            idle_park_timeout: Duration::from_millis(env_get(
                "COOP_IDLE_PARK_TIMEOUT_MS",
                defaults::IDLE_PARK_TIMEOUT_MS,
            )),
            debug_logging: env_get_bool("COOP_DEBUG", defaults::DEBUG_LOGGING),
            report_stats: env_get_bool("COOP_REPORT_STATS", defaults::REPORT_STATS),
        }
    }

    /// Compile-time defaults only, no environment lookups.
    pub fn new() -> Self {
        Self {
            stack_size: defaults::STACK_SIZE,
            default_priority: Priority::new(defaults::DEFAULT_PRIORITY),
            main_priority: Priority::new(defaults::MAIN_PRIORITY),
            idle_park_timeout: Duration::from_millis(defaults::IDLE_PARK_TIMEOUT_MS),
            debug_logging: defaults::DEBUG_LOGGING,
            report_stats: defaults::REPORT_STATS,
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn main_priority(mut self, priority: Priority) -> Self {
        self.main_priority = priority;
        self
    }

    pub fn idle_park_timeout(mut self, d: Duration) -> Self {
        self.idle_park_timeout = d;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    pub fn report_stats(mut self, enable: bool) -> Self {
        self.report_stats = enable;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.idle_park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("idle_park_timeout must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("Scheduler Configuration:");
        kprintln!("  stack_size:          {}", self.stack_size);
        kprintln!("  default_priority:    {}", self.default_priority);
        kprintln!("  main_priority:       {}", self.main_priority);
        kprintln!("  idle_park_timeout:   {:?}", self.idle_park_timeout);
        kprintln!("  debug_logging:       {}", self.debug_logging);
        kprintln!("  report_stats:        {}", self.report_stats);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SchedError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => SchedError::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::new();
        assert_eq!(config.stack_size, defaults::STACK_SIZE);
        assert_eq!(config.default_priority, Priority::new(defaults::DEFAULT_PRIORITY));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .stack_size(1024 * 1024)
            .default_priority(Priority::new(3))
            .idle_park_timeout(Duration::from_millis(2))
            .report_stats(true);

        assert_eq!(config.stack_size, 1024 * 1024);
        assert_eq!(config.default_priority, Priority::new(3));
        assert_eq!(config.idle_park_timeout, Duration::from_millis(2));
        assert!(config.report_stats);
    }

    #[test]
    fn test_validation() {
        let config = RuntimeConfig::new().stack_size(4096);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue("stack_size must be >= 16KB"))
        );

        let config = RuntimeConfig::new().idle_park_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}

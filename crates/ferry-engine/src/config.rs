//! Scheduler configuration, validation, and error types.
//!
//! [`SchedulerConfig`] is the builder-input for a [`TaskList`](crate::TaskList).
//! [`validate()`](SchedulerConfig::validate) checks its invariants;
//! `TaskList::new` calls it before accepting the configuration.

use thiserror::Error;

/// Environment variable overriding [`SchedulerConfig::max_live_tasks`].
pub const ENV_MAX_LIVE_TASKS: &str = "FERRY_MAX_LIVE_TASKS";
/// Environment variable overriding [`SchedulerConfig::verbose`].
pub const ENV_VERBOSE: &str = "FERRY_VERBOSE";

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while building or validating a [`SchedulerConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The live-task limit must admit at least one task.
    #[error("max_live_tasks must be at least 1")]
    ZeroLiveTaskLimit,
    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// The configuration key.
        key: &'static str,
        /// The rejected text.
        value: String,
    },
}

// ── SchedulerConfig ────────────────────────────────────────────────

/// Configuration for a [`TaskList`](crate::TaskList).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of tasks simultaneously started but not finished.
    /// Bounds outstanding transport operations and their buffers.
    /// Default: 50. Minimum: 1.
    pub max_live_tasks: usize,
    /// Log the dependency listing at `debug` level before each execution.
    /// Default: false.
    pub verbose: bool,
    /// Record a start/finish event log in the
    /// [`ExecReport`](crate::ExecReport). Default: false.
    pub record_events: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_live_tasks: 50,
            verbose: false,
            record_events: false,
        }
    }
}

impl SchedulerConfig {
    /// Set the live-task limit.
    pub fn with_max_live_tasks(mut self, limit: usize) -> Self {
        self.max_live_tasks = limit;
        self
    }

    /// Enable or disable the event log.
    pub fn with_record_events(mut self, record: bool) -> Self {
        self.record_events = record;
        self
    }

    /// Enable or disable the dependency listing.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_live_tasks == 0 {
            return Err(ConfigError::ZeroLiveTaskLimit);
        }
        Ok(())
    }

    /// Defaults overridden by [`ENV_MAX_LIVE_TASKS`] and [`ENV_VERBOSE`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values and
    /// propagates [`validate`](Self::validate) failures.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the
    /// [`ENV_MAX_LIVE_TASKS`] and [`ENV_VERBOSE`] keys.
    ///
    /// # Errors
    ///
    /// As [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_LIVE_TASKS) {
            config.max_live_tasks = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_LIVE_TASKS,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_VERBOSE) {
            config.verbose = match raw.trim() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_VERBOSE,
                        value: raw,
                    })
                }
            };
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_live_tasks, 50);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limit_rejected() {
        let config = SchedulerConfig::default().with_max_live_tasks(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroLiveTaskLimit));
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config =
            SchedulerConfig::from_lookup(lookup(&[(ENV_MAX_LIVE_TASKS, " 8 "), (ENV_VERBOSE, "on")]))
                .unwrap();
        assert_eq!(config.max_live_tasks, 8);
        assert!(config.verbose);
        assert!(!config.record_events);
    }

    #[test]
    fn lookup_rejects_garbage() {
        assert_eq!(
            SchedulerConfig::from_lookup(lookup(&[(ENV_MAX_LIVE_TASKS, "many")])),
            Err(ConfigError::InvalidValue {
                key: ENV_MAX_LIVE_TASKS,
                value: "many".into()
            })
        );
        assert!(SchedulerConfig::from_lookup(lookup(&[(ENV_VERBOSE, "perhaps")])).is_err());
        assert_eq!(
            SchedulerConfig::from_lookup(lookup(&[(ENV_MAX_LIVE_TASKS, "0")])),
            Err(ConfigError::ZeroLiveTaskLimit)
        );
    }
}

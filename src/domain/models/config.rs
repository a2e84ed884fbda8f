use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the harness
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Polling profiles per kind of transition
    #[serde(default)]
    pub polling: PollingProfiles,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulated dataplane configuration
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Interval and deadline for one convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    /// Delay between poll attempts in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Cumulative wait before giving up, in milliseconds
    #[serde(default = "default_creation_timeout_ms")]
    pub timeout_ms: u64,
}

impl PollingConfig {
    /// Profile from an interval and a deadline.
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Delay between attempts.
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Cumulative wait before giving up.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Same interval, different deadline.
    #[must_use]
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            interval_ms: self.interval_ms,
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_creation_timeout_ms() -> u64 {
    20_000
}

const fn default_removal_timeout_ms() -> u64 {
    60_000
}

const fn default_counter_timeout_ms() -> u64 {
    30_000
}

const fn default_settle_ms() -> u64 {
    20_000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_creation_timeout_ms(),
        }
    }
}

/// Polling profiles; removal and counter teardown are slower than creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollingProfiles {
    /// Waits after a create.
    #[serde(default = "default_creation")]
    pub creation: PollingConfig,

    /// Waits after a remove.
    #[serde(default = "default_removal")]
    pub removal: PollingConfig,

    /// Counter attach and detach waits.
    #[serde(default = "default_counter")]
    pub counter: PollingConfig,

    /// Settle wait before checking that a blocked removal left state unchanged
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl PollingProfiles {
    /// Settle wait as a duration.
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

const fn default_creation() -> PollingConfig {
    PollingConfig {
        interval_ms: default_interval_ms(),
        timeout_ms: default_creation_timeout_ms(),
    }
}

const fn default_removal() -> PollingConfig {
    PollingConfig {
        interval_ms: default_interval_ms(),
        timeout_ms: default_removal_timeout_ms(),
    }
}

const fn default_counter() -> PollingConfig {
    PollingConfig {
        interval_ms: default_interval_ms(),
        timeout_ms: default_counter_timeout_ms(),
    }
}

impl Default for PollingProfiles {
    fn default() -> Self {
        Self {
            creation: default_creation(),
            removal: default_removal(),
            counter: default_counter(),
            settle_ms: default_settle_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Simulated dataplane timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulatorConfig {
    /// Delay between an intent write and its materialization
    #[serde(default = "default_materialize_delay_ms")]
    pub materialize_delay_ms: u64,

    /// Period of the background materializer loop
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl SimulatorConfig {
    /// Delay between a write and its realized effect.
    pub const fn materialize_delay(&self) -> Duration {
        Duration::from_millis(self.materialize_delay_ms)
    }

    /// Materializer period.
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

const fn default_materialize_delay_ms() -> u64 {
    250
}

const fn default_tick_ms() -> u64 {
    50
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            materialize_delay_ms: default_materialize_delay_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

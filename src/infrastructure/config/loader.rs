use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, PollingConfig};

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".converge";

/// Prefix of environment overrides, e.g. `CONVERGE_POLLING__SETTLE_MS`
pub const ENV_PREFIX: &str = "CONVERGE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid polling interval for {0}: must be at least 1ms")]
    ZeroInterval(&'static str),

    #[error("Invalid polling timeout for {profile}: {timeout_ms}ms is shorter than the {interval_ms}ms interval")]
    TimeoutShorterThanInterval {
        profile: &'static str,
        timeout_ms: u64,
        interval_ms: u64,
    },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid simulator tick: must be at least 1ms")]
    ZeroTick,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .converge/config.yaml (project config)
    /// 3. .converge/local.yaml (local overrides, optional)
    /// 4. Environment variables (CONVERGE_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new("."))
    }

    /// Same as [`Self::load`] with the config directory under `root`.
    pub fn load_from_dir(root: &Path) -> Result<Config> {
        let dir = root.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate_polling(profile: &'static str, polling: &PollingConfig) -> Result<(), ConfigError> {
        if polling.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval(profile));
        }
        if polling.timeout_ms < polling.interval_ms {
            return Err(ConfigError::TimeoutShorterThanInterval {
                profile,
                timeout_ms: polling.timeout_ms,
                interval_ms: polling.interval_ms,
            });
        }
        Ok(())
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let polling = &config.polling;
        Self::validate_polling("creation", &polling.creation)?;
        Self::validate_polling("removal", &polling.removal)?;
        Self::validate_polling("counter", &polling.counter)?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.simulator.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.creation.timeout_ms, 20_000);
        assert_eq!(config.polling.removal.timeout_ms, 60_000);
        assert_eq!(config.polling.counter.timeout_ms, 30_000);
        assert_eq!(config.polling.settle_ms, 20_000);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
polling:
  creation:
    interval_ms: 200
    timeout_ms: 5000
  settle_ms: 1000
logging:
  level: debug
  format: json
simulator:
  materialize_delay_ms: 10
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.polling.creation.interval_ms, 200);
        assert_eq!(config.polling.creation.timeout_ms, 5000);
        assert_eq!(config.polling.removal.timeout_ms, 60_000);
        assert_eq!(config.polling.settle_ms, 1000);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.simulator.materialize_delay_ms, 10);
        assert_eq!(config.simulator.tick_ms, 50);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.polling.removal.interval_ms = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroInterval("removal")
        ));
    }

    #[test]
    fn test_validate_timeout_shorter_than_interval() {
        let mut config = Config::default();
        config.polling.counter.timeout_ms = 10;

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::TimeoutShorterThanInterval {
                profile,
                timeout_ms,
                interval_ms,
            } => {
                assert_eq!(profile, "counter");
                assert_eq!(timeout_ms, 10);
                assert_eq!(interval_ms, 1000);
            }
            other => panic!("Expected TimeoutShorterThanInterval, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            _ => panic!("Expected InvalidLogLevel error"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            _ => panic!("Expected InvalidLogFormat error"),
        }
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidRotation(_)
        ));
    }

    #[test]
    fn test_validate_zero_tick() {
        let mut config = Config::default();
        config.simulator.tick_ms = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroTick
        ));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: loud").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_hierarchical_merging_with_env_override() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.yaml"),
            "polling:\n  settle_ms: 5000\nlogging:\n  level: info\n  format: json\n",
        )
        .unwrap();
        fs::write(dir.join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        let config = temp_env::with_vars(
            [
                ("CONVERGE_POLLING__SETTLE_MS", Some("750")),
                ("CONVERGE_SIMULATOR__TICK_MS", Some("5")),
            ],
            || ConfigLoader::load_from_dir(root.path()),
        )
        .unwrap();

        assert_eq!(config.polling.settle_ms, 750, "Env should win");
        assert_eq!(config.simulator.tick_ms, 5);
        assert_eq!(config.logging.level, "debug", "Local file should win");
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let root = TempDir::new().unwrap();
        let config = temp_env::with_vars_unset(
            ["CONVERGE_POLLING__SETTLE_MS", "CONVERGE_SIMULATOR__TICK_MS"],
            || ConfigLoader::load_from_dir(root.path()),
        )
        .unwrap();
        assert_eq!(config.polling, Default::default());
    }
}

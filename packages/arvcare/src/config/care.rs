use super::{LogConfig, ARV_PREFIX};
use crate::cli::Args;
use crate::error::{ConfigError, Error};
use config::{Config, Environment};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CareConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub slots: SlotsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    #[serde(default = "SchedulerConfig::default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Lookahead window: a PENDING reminder due within this many minutes of
    /// "now" is promoted to SENT.
    #[serde(default = "SchedulerConfig::default_horizon_minutes")]
    pub horizon_minutes: i64,

    #[serde(default = "SchedulerConfig::default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SlotsConfig {
    /// Width of a generated appointment slot in minutes.
    #[serde(default = "SlotsConfig::default_slot_minutes")]
    pub slot_minutes: i64,
}

/// Config defaults to a file called `arvcare.toml` in the current directory.
/// Supports TOML, JSON, YAML
/// Variable names should match the struct field names.
///
/// ENV vars can be used to override file settings.
///
/// ENV vars must be prefixed with `ARV_`.
///
impl CareConfig {
    pub fn default_path() -> String {
        super::DEFAULT_CONFIG_FILE_PATH.to_string()
    }

    pub fn load(args: &Args) -> Result<CareConfig, Error> {
        // Log a warning to user that config file is missing
        if !PathBuf::from(&args.config_file_path).exists() {
            println!(
                "Configuration file was not found: {}",
                args.config_file_path
            );
            println!("Loading config values from environment variables.");
        }
        let mut config = CareConfig::build(&args.config_file_path)?;

        // If log level is default, it has not been set by the user in config
        if config.log.level == LogConfig::default_log_level() {
            config.log.level = args.log_level;
        }

        // If log format is default, it has not been set by the user in config
        if config.log.format == LogConfig::default_log_format() {
            config.log.format = args.log_format;
        }

        Ok(config)
    }

    pub fn build(path: &str) -> Result<Self, Error> {
        // For parsing top-level values such as ARV_LOG
        // and for parsing nested env values such as ARV_SCHEDULER__TICK_INTERVAL_SECS
        let arv_env_source = Environment::with_prefix(ARV_PREFIX)
            .try_parsing(true)
            .separator("__")
            .prefix_separator("_");

        let config: Self = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(arv_env_source)
            .build()?
            .try_deserialize()
            .map_err(|err| match err {
                config::ConfigError::Message(ref s) => match s {
                    s if s.contains("missing field") => {
                        let name = extract_field_name(s).map_or("unknown".to_string(), |s| s);
                        ConfigError::MissingParameter { name }
                    }
                    s if s.contains("does not have variant constructor") => {
                        let (name, value) = extract_invalid_field(s);
                        ConfigError::InvalidParameter { name, value }
                    }
                    _ => err.into(),
                },
                _ => err.into(),
            })?;

        Ok(config)
    }
}

impl SchedulerConfig {
    pub const fn default_tick_interval_secs() -> u64 {
        20
    }

    pub const fn default_horizon_minutes() -> i64 {
        5
    }

    pub const fn default_shutdown_timeout() -> u64 {
        2000
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.horizon_minutes)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_interval_secs: SchedulerConfig::default_tick_interval_secs(),
            horizon_minutes: SchedulerConfig::default_horizon_minutes(),
            shutdown_timeout: SchedulerConfig::default_shutdown_timeout(),
        }
    }
}

impl SlotsConfig {
    pub const fn default_slot_minutes() -> i64 {
        30
    }

    pub fn slot_step(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.slot_minutes)
    }
}

impl Default for SlotsConfig {
    fn default() -> Self {
        SlotsConfig {
            slot_minutes: SlotsConfig::default_slot_minutes(),
        }
    }
}

///
/// Extracts a field name (if present) from a config::ConfigError::Message
/// This is called in `build` if a ConfigError message contains the string `missing field`
///
fn extract_field_name(input: &str) -> Option<String> {
    let re = Regex::new(r"`(\w+)`").unwrap();
    re.captures(input)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

///
/// Extracts a field name (if present) from a config::ConfigError::Message
/// This is called in `build` if a ConfigError message contains the string `does not have variant constructor`
///
/// Error string is `enum {name} does not have variant constructor {value}`
///
fn extract_invalid_field(input: &str) -> (String, String) {
    let words = input.split(" ").collect::<Vec<_>>();

    let default_name = "unknown".to_string();
    let default_val = "".to_string();

    if !input.starts_with("enum") {
        return (default_name, default_val);
    }

    let name = words
        .get(1)
        .map_or(default_name.to_owned(), |w| w.to_string());

    let value = words
        .last()
        .map_or(default_val.to_owned(), |w| w.to_string());

    (name, value)
}

#[cfg(test)]
mod tests {
    use crate::config::CareConfig;

    #[test]
    fn defaults_without_file() {
        temp_env::with_vars_unset(
            [
                "ARV_SCHEDULER__TICK_INTERVAL_SECS",
                "ARV_SCHEDULER__HORIZON_MINUTES",
                "ARV_SLOTS__SLOT_MINUTES",
            ],
            || {
                let config = CareConfig::build("does-not-exist.toml").unwrap();
                assert_eq!(config.scheduler.tick_interval_secs, 20);
                assert_eq!(config.scheduler.horizon_minutes, 5);
                assert_eq!(config.slots.slot_minutes, 30);
            },
        );
    }

    #[test]
    fn file_values_are_loaded() {
        temp_env::with_vars_unset(["ARV_SCHEDULER__TICK_INTERVAL_SECS"], || {
            let config = CareConfig::build("tests/config/arvcare-test.toml").unwrap();
            assert_eq!(config.scheduler.tick_interval_secs, 5);
            assert_eq!(config.scheduler.horizon_minutes, 10);
        });
    }

    #[test]
    fn env_overrides_file() {
        temp_env::with_vars(
            [
                ("ARV_SCHEDULER__TICK_INTERVAL_SECS", Some("60")),
                ("ARV_SLOTS__SLOT_MINUTES", Some("15")),
            ],
            || {
                let config = CareConfig::build("tests/config/arvcare-test.toml").unwrap();
                assert_eq!(config.scheduler.tick_interval_secs, 60);
                assert_eq!(config.slots.slot_minutes, 15);
            },
        );
    }

    #[test]
    fn horizon_is_a_chrono_duration() {
        let config = CareConfig::default();
        assert_eq!(config.scheduler.horizon(), chrono::Duration::minutes(5));
        assert_eq!(
            config.scheduler.tick_interval(),
            std::time::Duration::from_secs(20)
        );
    }
}

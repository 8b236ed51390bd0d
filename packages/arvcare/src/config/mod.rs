mod care;
mod log;

pub use care::{CareConfig, SchedulerConfig, SlotsConfig};
pub use log::{LogConfig, LogFormat, LogLevel, LogOutput};

pub const ARV_PREFIX: &str = "ARV";
pub const DEFAULT_CONFIG_FILE_PATH: &str = "arvcare.toml";

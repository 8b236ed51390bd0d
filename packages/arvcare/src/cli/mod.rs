use crate::config::{LogConfig, LogFormat, LogLevel, DEFAULT_CONFIG_FILE_PATH};
use clap::Parser;

#[derive(Clone, Debug, Parser)]
#[command(name = "arvcare", version, about = "HIV care scheduling service")]
pub struct Args {
    ///
    /// Optional path to the configuration file.
    ///
    /// Default is "arvcare.toml".
    /// Configuration is loaded from this file, if present.
    /// Environment variables are used instead of the file or to override any values defined in the file.
    #[arg(short = 'p', long, default_value = DEFAULT_CONFIG_FILE_PATH, verbatim_doc_comment)]
    pub config_file_path: String,

    ///
    /// Optional log level.
    ///
    #[arg(short, long, value_enum, default_value_t = LogConfig::default_log_level(), env = "ARV_LOG__LEVEL")]
    pub log_level: LogLevel,

    ///
    /// Optional log format. Default is "pretty" if running in a terminal session, otherwise "structured".
    ///
    #[arg(short = 'f', long, value_enum, default_value_t = LogConfig::default_log_format(), env = "ARV_LOG__FORMAT")]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_flags_given() {
        temp_env::with_vars_unset(["ARV_LOG__LEVEL", "ARV_LOG__FORMAT"], || {
            let args = Args::parse_from(["arvcare"]);
            assert_eq!(args.config_file_path, "arvcare.toml");
            assert_eq!(args.log_level, LogLevel::Info);
        });
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "arvcare",
            "--config-file-path",
            "/etc/arvcare/arvcare.toml",
            "--log-level",
            "debug",
            "--log-format",
            "text",
        ]);
        assert_eq!(args.config_file_path, "/etc/arvcare/arvcare.toml");
        assert_eq!(args.log_level, LogLevel::Debug);
        assert_eq!(args.log_format, LogFormat::Text);
    }
}

pub mod subscriber;

use crate::config::{LogConfig, LogFormat};
use std::sync::Once;
use tracing_subscriber::{
    fmt::{
        format::{DefaultFields, Format},
        writer::BoxMakeWriter,
        SubscriberBuilder,
    },
    EnvFilter,
};

// Log targets used in logs like `debug!(target: SCHEDULER, "Tick");`
// If you add one, make sure `log_targets()` and `log_level_for()` functions are updated.
pub const SCHEDULER: &str = "scheduler";
pub const SLOTS: &str = "slots";
pub const TREATMENT: &str = "treatment";
pub const STORE: &str = "store";
pub const NOTIFY: &str = "notify";
pub const CONFIG: &str = "config";

static INIT: Once = Once::new();

type Subscriber = Box<dyn tracing::Subscriber + Send + Sync>;

pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = subscriber::builder(&config);
        let subscriber = set_format(&config, subscriber);

        tracing::subscriber::set_global_default(subscriber)
            .expect("Could not set the tracing subscriber");
    });
}

pub fn set_format(
    config: &LogConfig,
    builder: SubscriberBuilder<DefaultFields, Format, EnvFilter, BoxMakeWriter>,
) -> Subscriber {
    match &config.format {
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
        LogFormat::Structured => Box::new(builder.json().finish()),
        LogFormat::Text => Box::new(builder.finish()),
    }
}

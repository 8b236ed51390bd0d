#![allow(dead_code)]

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod log;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod slots;
pub mod store;
pub mod treatment;

pub use crate::cli::Args;
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{CareConfig, LogConfig, SchedulerConfig, SlotsConfig};
pub use crate::error::Error;
pub use crate::log::init;
pub use crate::notify::{LogNotifier, Notifier};
pub use crate::scheduler::ReminderScheduler;
pub use crate::store::{ClinicStore, MemoryStore};
pub use crate::treatment::TreatmentService;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

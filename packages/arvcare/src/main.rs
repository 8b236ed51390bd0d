use arvcare::cli::Args;
use arvcare::clock::SystemClock;
use arvcare::config::CareConfig;
use arvcare::log;
use arvcare::notify::LogNotifier;
use arvcare::scheduler::ReminderScheduler;
use arvcare::store::MemoryStore;
use clap::Parser;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match CareConfig::load(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration Error: {}", err);
            std::process::exit(exitcode::CONFIG);
        }
    };

    log::init(config.log.clone());

    info!(msg = "Starting ArvCare", version = arvcare::VERSION);

    let shutdown_timeout = config.scheduler.shutdown_timeout();

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);
    let notifier = Arc::new(LogNotifier);

    let scheduler = Arc::new(ReminderScheduler::new(
        store,
        clock,
        notifier,
        &config.scheduler,
    ));

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let handle = scheduler.spawn(config.scheduler.tick_interval(), shutdown.clone());
    tracker.spawn(async move {
        let _ = handle.await;
    });

    loop {
        tokio::select! {
            _ = sigint() => {
                info!(msg = "Received SIGINT");
                break;
            },
            _ = sigterm() => {
                info!(msg = "Received SIGTERM");
                break;
            },
        }
    }

    info!(msg = "Shutting down ArvCare");

    shutdown.cancel();
    tracker.close();

    if (tokio::time::timeout(shutdown_timeout, tracker.wait()).await).is_err() {
        warn!(msg = "Scheduler did not stop within the shutdown timeout");
    }
}

async fn sigint() -> std::io::Result<()> {
    signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}

async fn sigterm() -> std::io::Result<()> {
    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

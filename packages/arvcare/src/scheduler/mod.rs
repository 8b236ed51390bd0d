use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::log::SCHEDULER;
use crate::model::ReminderStatus;
use crate::notify::Notifier;
use crate::store::ClinicStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

///
/// Periodic promotion of due treatment reminders from PENDING to SENT.
///
/// Owns its collaborators and exposes a single [`tick`](Self::tick) so one
/// pass can be driven deterministically under test; [`spawn`](Self::spawn)
/// runs ticks on a fixed interval until the token is cancelled.
///
/// Promotion is at-least-once: a reminder due within the horizon is promoted
/// by some tick, and re-promotion is excluded by the PENDING query filter.
/// A tick racing a request-path write to the same reminder row is a known
/// gap of the store contract, see [`ClinicStore`].
///
pub struct ReminderScheduler {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    horizon: chrono::Duration,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ClinicStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: &SchedulerConfig,
    ) -> Self {
        ReminderScheduler {
            store,
            clock,
            notifier,
            horizon: config.horizon(),
        }
    }

    ///
    /// One scheduler pass.
    ///
    /// Queries reminders with `status == PENDING` and
    /// `reminder_date < now + horizon`, promotes each to SENT and hands it to
    /// the notifier. A failure on one reminder is logged and must not stop
    /// the rest of the batch. Returns the number of reminders promoted.
    ///
    pub async fn tick(&self) -> Result<usize, Error> {
        let now = self.clock.now();
        let horizon = now + self.horizon;

        let due = self.store.pending_reminders_before(horizon).await?;
        debug!(target: SCHEDULER, msg = "Tick", now = %now, due = due.len());

        let mut promoted = 0;
        for mut reminder in due {
            reminder.status = ReminderStatus::Sent;
            match self.store.save_reminder(&reminder).await {
                Ok(()) => {
                    promoted += 1;
                    info!(
                        target: SCHEDULER,
                        msg = "Reminder promoted to SENT",
                        reminder_id = reminder.id,
                        patient_id = reminder.patient_id,
                        due = %reminder.reminder_date,
                    );

                    if let Err(err) = self.notifier.notify(&reminder).await {
                        // The status transition stands; dispatch is best effort.
                        warn!(
                            target: SCHEDULER,
                            msg = "Reminder dispatch failed",
                            reminder_id = reminder.id,
                            error = err.to_string(),
                        );
                    }
                }
                Err(err) => {
                    error!(
                        target: SCHEDULER,
                        msg = "Could not promote reminder",
                        reminder_id = reminder.id,
                        error = err.to_string(),
                    );
                }
            }
        }

        Ok(promoted)
    }

    /// Run ticks every `interval` until `shutdown` is cancelled.
    pub fn spawn(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

            info!(
                target: SCHEDULER,
                msg = "Reminder scheduler started",
                interval_secs = interval.as_secs(),
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(target: SCHEDULER, msg = "Reminder scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.tick().await {
                            Ok(0) => {}
                            Ok(promoted) => {
                                debug!(target: SCHEDULER, msg = "Promoted reminders", promoted);
                            }
                            Err(err) => {
                                warn!(
                                    target: SCHEDULER,
                                    msg = "Scheduler tick failed",
                                    error = err.to_string(),
                                );
                            }
                        }
                    }
                }
            }
        })
    }
}

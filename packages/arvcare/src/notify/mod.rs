use crate::error::Error;
use crate::log::NOTIFY;
use crate::model::TreatmentReminder;
use tracing::info;

///
/// Dispatch collaborator invoked when a reminder is promoted to `SENT`.
///
/// The scheduler depends on the trait only; delivery is out of scope here and
/// a failed dispatch never rolls the status transition back.
///
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, reminder: &TreatmentReminder) -> Result<(), Error>;
}

/// Log-only stand-in for a real delivery channel.
///
/// TODO: deliver through an email/SMS gateway once one is provisioned.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, reminder: &TreatmentReminder) -> Result<(), Error> {
        info!(
            target: NOTIFY,
            msg = "Reminder due",
            reminder_id = reminder.id,
            patient_id = reminder.patient_id,
            reminder_type = ?reminder.reminder_type,
            due = %reminder.reminder_date,
        );
        Ok(())
    }
}

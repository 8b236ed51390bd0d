use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

///
/// Lifecycle of a treatment reminder.
///
/// Forward-only: `Pending` is promoted to `Sent` by the scheduler once the
/// reminder falls within the lookahead horizon, and `Completed` is only ever
/// set by an explicit user action.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Completed,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderType {
    Medication,
    Appointment,
    FollowUp,
    LabTest,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TreatmentReminder {
    pub id: i64,
    pub patient_id: i64,
    pub created_by: i64,
    pub reminder_type: ReminderType,
    pub reminder_date: NaiveDateTime,
    pub status: ReminderStatus,
    pub message: Option<String>,
}

/// A recurring weekly availability window for a doctor.
///
/// Invariant: `start_time < end_time`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DoctorSchedule {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// An appointment occupies exactly one discrete time point within a doctor's
/// schedule window on a given date.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub medical_service_id: Option<i64>,
    pub notes: Option<String>,
}

/// A concretely materialized, individually bookable consultation slot.
///
/// Distinct from [`DoctorSchedule`]: booking is exclusive and tracked with an
/// explicit flag rather than derived from existing appointments.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConsultationTimeSlot {
    pub id: i64,
    pub doctor_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_booked: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PatientTreatmentPlan {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub arv_protocol_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Prescription {
    pub id: i64,
    pub treatment_plan_id: i64,
    pub notes: Option<String>,
    pub details: Vec<PrescriptionDetail>,
}

/// One line item of a prescription.
///
/// `frequency` is a comma-separated list of `HH:MM` intake times, kept as a
/// raw string.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PrescriptionDetail {
    pub medication_id: i64,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration_days: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum IntakeStatus {
    Pending,
    Taken,
    Missed,
}

/// A single medication intake event exploded from a prescription detail.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MedicationSchedule {
    pub id: i64,
    pub prescription_id: i64,
    pub intake_time: NaiveDateTime,
    pub status: IntakeStatus,
}

// Directory entities. Their CRUD surface is owned by the persistence layer;
// the core only resolves references and checks the unique fields below.

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Patient {
    pub id: i64,
    pub patient_code: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Doctor {
    pub id: i64,
    pub full_name: String,
    pub specialty: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Staff {
    pub id: i64,
    pub full_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ArvProtocol {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Medication {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_status_wire_format() {
        let json = serde_json::to_string(&ReminderStatus::Pending).unwrap();
        assert_eq!(json, r#""PENDING""#);

        let status: ReminderStatus = serde_json::from_str(r#""SENT""#).unwrap();
        assert_eq!(status, ReminderStatus::Sent);
    }

    #[test]
    fn intake_status_wire_format() {
        // Intake status is recorded capitalised ("Pending"), not screaming
        // snake case like reminder status.
        let json = serde_json::to_string(&IntakeStatus::Pending).unwrap();
        assert_eq!(json, r#""Pending""#);
    }
}

mod memory;

pub use memory::MemoryStore;

use crate::error::Error;
use crate::model::{
    Appointment, ConsultationTimeSlot, DoctorSchedule, IntakeStatus, Medication,
    MedicationSchedule, PatientTreatmentPlan, Prescription, PrescriptionDetail, ReminderStatus,
    ReminderType, TreatmentReminder,
};
use chrono::{NaiveDate, NaiveDateTime, Weekday};

/// Row-insert input for a treatment reminder.
#[derive(Clone, Debug)]
pub struct NewReminder {
    pub patient_id: i64,
    pub created_by: i64,
    pub reminder_type: ReminderType,
    pub reminder_date: NaiveDateTime,
    pub status: ReminderStatus,
    pub message: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewTreatmentPlan {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub arv_protocol_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewPrescription {
    pub treatment_plan_id: i64,
    pub notes: Option<String>,
    pub details: Vec<PrescriptionDetail>,
}

#[derive(Clone, Debug)]
pub struct NewMedicationSchedule {
    pub prescription_id: i64,
    pub intake_time: NaiveDateTime,
    pub status: IntakeStatus,
}

#[derive(Clone, Debug)]
pub struct NewConsultationSlot {
    pub doctor_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

///
/// Persistence collaborator for the care core.
///
/// CRUD-by-id, find-by-foreign-key and the equality filter queries the core
/// needs. Implementations must make single-row saves atomic. The contract
/// deliberately does NOT require row locking or optimistic concurrency:
/// a scheduler tick and a request-path write racing on the same reminder row
/// is a known gap.
///
#[async_trait::async_trait]
pub trait ClinicStore: Send + Sync {
    // -- treatment reminders

    /// Reminders with `status == PENDING` and `reminder_date < horizon`.
    async fn pending_reminders_before(
        &self,
        horizon: NaiveDateTime,
    ) -> Result<Vec<TreatmentReminder>, Error>;

    async fn reminder(&self, id: i64) -> Result<Option<TreatmentReminder>, Error>;

    async fn reminders_for_patient(&self, patient_id: i64)
        -> Result<Vec<TreatmentReminder>, Error>;

    async fn insert_reminder(&self, reminder: NewReminder) -> Result<TreatmentReminder, Error>;

    /// Update an existing reminder row by id.
    async fn save_reminder(&self, reminder: &TreatmentReminder) -> Result<(), Error>;

    async fn delete_reminder(&self, id: i64) -> Result<bool, Error>;

    // -- doctor schedules and appointments

    async fn doctor_schedules(
        &self,
        doctor_id: i64,
        day_of_week: Weekday,
    ) -> Result<Vec<DoctorSchedule>, Error>;

    async fn appointments_on(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, Error>;

    // -- consultation time slots

    async fn consultation_slot(&self, id: i64) -> Result<Option<ConsultationTimeSlot>, Error>;

    async fn consultation_slots_between(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<ConsultationTimeSlot>, Error>;

    async fn insert_consultation_slot(
        &self,
        slot: NewConsultationSlot,
    ) -> Result<ConsultationTimeSlot, Error>;

    async fn save_consultation_slot(&self, slot: &ConsultationTimeSlot) -> Result<(), Error>;

    // -- treatment plans and prescriptions

    async fn plan(&self, id: i64) -> Result<Option<PatientTreatmentPlan>, Error>;

    async fn plans_for_patient(&self, patient_id: i64)
        -> Result<Vec<PatientTreatmentPlan>, Error>;

    async fn insert_plan(&self, plan: NewTreatmentPlan) -> Result<PatientTreatmentPlan, Error>;

    async fn save_plan(&self, plan: &PatientTreatmentPlan) -> Result<(), Error>;

    async fn insert_prescription(
        &self,
        prescription: NewPrescription,
    ) -> Result<Prescription, Error>;

    async fn insert_medication_schedule(
        &self,
        schedule: NewMedicationSchedule,
    ) -> Result<MedicationSchedule, Error>;

    async fn medication_schedules_for_prescription(
        &self,
        prescription_id: i64,
    ) -> Result<Vec<MedicationSchedule>, Error>;

    // -- directory reference resolution

    async fn patient_exists(&self, id: i64) -> Result<bool, Error>;

    async fn doctor_exists(&self, id: i64) -> Result<bool, Error>;

    async fn staff_exists(&self, id: i64) -> Result<bool, Error>;

    async fn protocol_exists(&self, id: i64) -> Result<bool, Error>;

    async fn medication(&self, id: i64) -> Result<Option<Medication>, Error>;
}

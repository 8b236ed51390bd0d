use super::{
    ClinicStore, NewConsultationSlot, NewMedicationSchedule, NewPrescription, NewReminder,
    NewTreatmentPlan,
};
use crate::error::{Error, StoreError};
use crate::model::{
    Appointment, AppointmentStatus, ArvProtocol, ConsultationTimeSlot, Doctor, DoctorSchedule,
    Medication, MedicationSchedule, Patient, PatientTreatmentPlan, Prescription, ReminderStatus,
    Staff, TreatmentReminder,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    reminders: HashMap<i64, TreatmentReminder>,
    schedules: Vec<DoctorSchedule>,
    appointments: Vec<Appointment>,
    consultation_slots: HashMap<i64, ConsultationTimeSlot>,
    plans: HashMap<i64, PatientTreatmentPlan>,
    prescriptions: HashMap<i64, Prescription>,
    medication_schedules: HashMap<i64, MedicationSchedule>,
    patients: HashMap<i64, Patient>,
    doctors: HashMap<i64, Doctor>,
    staff: HashMap<i64, Staff>,
    protocols: HashMap<i64, ArvProtocol>,
    medications: HashMap<i64, Medication>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

///
/// In-process implementation of [`ClinicStore`] over a single `RwLock`.
///
/// Backs the unit tests and the standalone scheduler binary. Single-row
/// saves are atomic because every mutation holds the write lock, which is
/// strictly more than the store contract requires.
///
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Directory entities are seeded through these inherent methods. Their
    // full CRUD surface belongs to the persistence layer, not the core.

    pub fn add_patient(
        &self,
        patient_code: &str,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Patient, Error> {
        let mut state = self.state.write().expect("store lock poisoned");

        for existing in state.patients.values() {
            if existing.patient_code == patient_code {
                return Err(Error::Conflict {
                    field: "patient_code",
                    value: patient_code.to_string(),
                });
            }
            if email.is_some() && existing.email.as_deref() == email {
                return Err(Error::Conflict {
                    field: "email",
                    value: email.unwrap_or_default().to_string(),
                });
            }
            if phone.is_some() && existing.phone.as_deref() == phone {
                return Err(Error::Conflict {
                    field: "phone",
                    value: phone.unwrap_or_default().to_string(),
                });
            }
        }

        let patient = Patient {
            id: state.next_id(),
            patient_code: patient_code.to_string(),
            full_name: full_name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
        };
        state.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    pub fn add_doctor(&self, full_name: &str, specialty: Option<&str>) -> Doctor {
        let mut state = self.state.write().expect("store lock poisoned");
        let doctor = Doctor {
            id: state.next_id(),
            full_name: full_name.to_string(),
            specialty: specialty.map(str::to_string),
        };
        state.doctors.insert(doctor.id, doctor.clone());
        doctor
    }

    pub fn add_staff(&self, full_name: &str) -> Staff {
        let mut state = self.state.write().expect("store lock poisoned");
        let staff = Staff {
            id: state.next_id(),
            full_name: full_name.to_string(),
        };
        state.staff.insert(staff.id, staff.clone());
        staff
    }

    pub fn add_protocol(&self, name: &str, description: Option<&str>) -> ArvProtocol {
        let mut state = self.state.write().expect("store lock poisoned");
        let protocol = ArvProtocol {
            id: state.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        state.protocols.insert(protocol.id, protocol.clone());
        protocol
    }

    pub fn add_medication(&self, name: &str) -> Medication {
        let mut state = self.state.write().expect("store lock poisoned");
        let medication = Medication {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.medications.insert(medication.id, medication.clone());
        medication
    }

    pub fn add_doctor_schedule(
        &self,
        doctor_id: i64,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
        location: Option<&str>,
    ) -> Result<DoctorSchedule, Error> {
        if start_time >= end_time {
            return Err(Error::InvalidWindow {
                start: start_time.to_string(),
                end: end_time.to_string(),
            });
        }

        let mut state = self.state.write().expect("store lock poisoned");
        let schedule = DoctorSchedule {
            id: state.next_id(),
            doctor_id,
            day_of_week,
            start_time,
            end_time,
            location: location.map(str::to_string),
        };
        state.schedules.push(schedule.clone());
        Ok(schedule)
    }

    pub fn add_appointment(
        &self,
        doctor_id: i64,
        patient_id: i64,
        appointment_date: NaiveDate,
        appointment_time: NaiveTime,
    ) -> Appointment {
        let mut state = self.state.write().expect("store lock poisoned");
        let appointment = Appointment {
            id: state.next_id(),
            doctor_id,
            patient_id,
            appointment_date,
            appointment_time,
            status: AppointmentStatus::Pending,
            medical_service_id: None,
            notes: None,
        };
        state.appointments.push(appointment.clone());
        appointment
    }

}

#[async_trait::async_trait]
impl ClinicStore for MemoryStore {
    async fn pending_reminders_before(
        &self,
        horizon: NaiveDateTime,
    ) -> Result<Vec<TreatmentReminder>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        let mut due: Vec<TreatmentReminder> = state
            .reminders
            .values()
            .filter(|r| r.status == ReminderStatus::Pending && r.reminder_date < horizon)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.id);
        Ok(due)
    }

    async fn reminder(&self, id: i64) -> Result<Option<TreatmentReminder>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.reminders.get(&id).cloned())
    }

    async fn reminders_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<TreatmentReminder>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        let mut found: Vec<TreatmentReminder> = state
            .reminders
            .values()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn insert_reminder(&self, reminder: NewReminder) -> Result<TreatmentReminder, Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        let reminder = TreatmentReminder {
            id: state.next_id(),
            patient_id: reminder.patient_id,
            created_by: reminder.created_by,
            reminder_type: reminder.reminder_type,
            reminder_date: reminder.reminder_date,
            status: reminder.status,
            message: reminder.message,
        };
        state.reminders.insert(reminder.id, reminder.clone());
        Ok(reminder)
    }

    async fn save_reminder(&self, reminder: &TreatmentReminder) -> Result<(), Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        match state.reminders.get_mut(&reminder.id) {
            Some(row) => {
                *row = reminder.clone();
                Ok(())
            }
            None => Err(StoreError::MissingRow {
                table: "treatment_reminders",
                id: reminder.id,
            }
            .into()),
        }
    }

    async fn delete_reminder(&self, id: i64) -> Result<bool, Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        Ok(state.reminders.remove(&id).is_some())
    }

    async fn doctor_schedules(
        &self,
        doctor_id: i64,
        day_of_week: Weekday,
    ) -> Result<Vec<DoctorSchedule>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        let mut found: Vec<DoctorSchedule> = state
            .schedules
            .iter()
            .filter(|s| s.doctor_id == doctor_id && s.day_of_week == day_of_week)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.start_time);
        Ok(found)
    }

    async fn appointments_on(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.appointment_date == date)
            .cloned()
            .collect())
    }

    async fn consultation_slot(&self, id: i64) -> Result<Option<ConsultationTimeSlot>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.consultation_slots.get(&id).cloned())
    }

    async fn consultation_slots_between(
        &self,
        doctor_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<ConsultationTimeSlot>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        let mut found: Vec<ConsultationTimeSlot> = state
            .consultation_slots
            .values()
            .filter(|s| s.doctor_id == doctor_id && s.start_time >= start && s.start_time <= end)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.start_time);
        Ok(found)
    }

    async fn insert_consultation_slot(
        &self,
        slot: NewConsultationSlot,
    ) -> Result<ConsultationTimeSlot, Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        let slot = ConsultationTimeSlot {
            id: state.next_id(),
            doctor_id: slot.doctor_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_booked: false,
        };
        state.consultation_slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn save_consultation_slot(&self, slot: &ConsultationTimeSlot) -> Result<(), Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        match state.consultation_slots.get_mut(&slot.id) {
            Some(row) => {
                *row = slot.clone();
                Ok(())
            }
            None => Err(StoreError::MissingRow {
                table: "consultation_time_slots",
                id: slot.id,
            }
            .into()),
        }
    }

    async fn plan(&self, id: i64) -> Result<Option<PatientTreatmentPlan>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.plans.get(&id).cloned())
    }

    async fn plans_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<PatientTreatmentPlan>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        let mut found: Vec<PatientTreatmentPlan> = state
            .plans
            .values()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.id);
        Ok(found)
    }

    async fn insert_plan(&self, plan: NewTreatmentPlan) -> Result<PatientTreatmentPlan, Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        let plan = PatientTreatmentPlan {
            id: state.next_id(),
            patient_id: plan.patient_id,
            doctor_id: plan.doctor_id,
            arv_protocol_id: plan.arv_protocol_id,
            start_date: plan.start_date,
            end_date: plan.end_date,
            notes: plan.notes,
        };
        state.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn save_plan(&self, plan: &PatientTreatmentPlan) -> Result<(), Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        match state.plans.get_mut(&plan.id) {
            Some(row) => {
                *row = plan.clone();
                Ok(())
            }
            None => Err(StoreError::MissingRow {
                table: "patient_treatment_plans",
                id: plan.id,
            }
            .into()),
        }
    }

    async fn insert_prescription(
        &self,
        prescription: NewPrescription,
    ) -> Result<Prescription, Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        let prescription = Prescription {
            id: state.next_id(),
            treatment_plan_id: prescription.treatment_plan_id,
            notes: prescription.notes,
            details: prescription.details,
        };
        state
            .prescriptions
            .insert(prescription.id, prescription.clone());
        Ok(prescription)
    }

    async fn insert_medication_schedule(
        &self,
        schedule: NewMedicationSchedule,
    ) -> Result<MedicationSchedule, Error> {
        let mut state = self.state.write().expect("store lock poisoned");
        let schedule = MedicationSchedule {
            id: state.next_id(),
            prescription_id: schedule.prescription_id,
            intake_time: schedule.intake_time,
            status: schedule.status,
        };
        state
            .medication_schedules
            .insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn medication_schedules_for_prescription(
        &self,
        prescription_id: i64,
    ) -> Result<Vec<MedicationSchedule>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        let mut found: Vec<MedicationSchedule> = state
            .medication_schedules
            .values()
            .filter(|s| s.prescription_id == prescription_id)
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.intake_time, s.id));
        Ok(found)
    }

    async fn patient_exists(&self, id: i64) -> Result<bool, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.patients.contains_key(&id))
    }

    async fn doctor_exists(&self, id: i64) -> Result<bool, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.doctors.contains_key(&id))
    }

    async fn staff_exists(&self, id: i64) -> Result<bool, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.staff.contains_key(&id))
    }

    async fn protocol_exists(&self, id: i64) -> Result<bool, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.protocols.contains_key(&id))
    }

    async fn medication(&self, id: i64) -> Result<Option<Medication>, Error> {
        let state = self.state.read().expect("store lock poisoned");
        Ok(state.medications.get(&id).cloned())
    }
}

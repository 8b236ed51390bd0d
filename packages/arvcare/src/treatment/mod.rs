use crate::clock::Clock;
use crate::error::Error;
use crate::log::TREATMENT;
use crate::model::{
    IntakeStatus, PatientTreatmentPlan, Prescription, PrescriptionDetail, ReminderStatus,
    ReminderType, TreatmentReminder,
};
use crate::store::{
    ClinicStore, NewMedicationSchedule, NewPrescription, NewReminder, NewTreatmentPlan,
};
use chrono::{Duration, NaiveTime};
use std::sync::Arc;
use tracing::{debug, info, warn};

///
/// One comma-separated token of a prescription's `frequency` string.
///
/// Tokens that do not parse as `HH:MM` are carried as `Skipped` so callers
/// can log them, then dropped. A malformed token never aborts the explosion
/// of its detail line.
///
#[derive(Clone, Debug, PartialEq)]
pub enum TimeToken {
    Parsed(NaiveTime),
    Skipped { raw: String },
}

/// Splits a frequency string such as `"08:00,20:00"` into intake times.
pub fn parse_frequency(frequency: &str) -> Vec<TimeToken> {
    frequency
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| match NaiveTime::parse_from_str(token, "%H:%M") {
            Ok(time) => TimeToken::Parsed(time),
            Err(_) => TimeToken::Skipped {
                raw: token.to_string(),
            },
        })
        .collect()
}

///
/// Treatment plan, prescription and reminder operations.
///
/// All operations validate every referenced entity before the first write,
/// so a failed call leaves the store untouched.
///
pub struct TreatmentService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl TreatmentService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        TreatmentService { store, clock }
    }

    ///
    /// Creates a treatment plan and closes out the patient's earlier plans.
    ///
    /// Any existing plan that is open-ended, or whose end date falls after
    /// the new plan's start date, is ended the day before the new plan
    /// starts. Plans already ended on or before the new start are left
    /// alone. Plans inserted out of start-date order are not validated
    /// against each other.
    ///
    pub async fn create_plan(
        &self,
        plan: NewTreatmentPlan,
    ) -> Result<PatientTreatmentPlan, Error> {
        if !self.store.patient_exists(plan.patient_id).await? {
            return Err(Error::NotFound {
                entity: "patient",
                id: plan.patient_id,
            });
        }
        if !self.store.doctor_exists(plan.doctor_id).await? {
            return Err(Error::NotFound {
                entity: "doctor",
                id: plan.doctor_id,
            });
        }
        if !self.store.protocol_exists(plan.arv_protocol_id).await? {
            return Err(Error::NotFound {
                entity: "arv_protocol",
                id: plan.arv_protocol_id,
            });
        }

        let superseded_end = plan.start_date - Duration::days(1);

        for mut existing in self.store.plans_for_patient(plan.patient_id).await? {
            let supersede = match existing.end_date {
                None => true,
                Some(end) => end > plan.start_date,
            };
            if supersede {
                existing.end_date = Some(superseded_end);
                self.store.save_plan(&existing).await?;
                info!(target: TREATMENT,
                    msg = "Superseded treatment plan",
                    plan_id = existing.id,
                    patient_id = existing.patient_id,
                    end_date = %superseded_end,
                );
            }
        }

        let created = self.store.insert_plan(plan).await?;
        info!(target: TREATMENT,
            msg = "Created treatment plan",
            plan_id = created.id,
            patient_id = created.patient_id,
        );
        Ok(created)
    }

    ///
    /// Creates a prescription under a treatment plan and explodes each detail
    /// line into per-intake medication schedule rows.
    ///
    /// The schedule starts today: for every day of `duration_days` and every
    /// parseable `HH:MM` token in `frequency`, one row with status `Pending`
    /// is written. Details referencing an unknown medication are skipped,
    /// and so are malformed frequency tokens; both are logged, neither fails
    /// the call.
    ///
    pub async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> Result<Prescription, Error> {
        let NewPrescription {
            treatment_plan_id,
            notes,
            details,
        } = prescription;

        if self.store.plan(treatment_plan_id).await?.is_none() {
            return Err(Error::NotFound {
                entity: "patient_treatment_plan",
                id: treatment_plan_id,
            });
        }

        let mut kept = Vec::with_capacity(details.len());
        for detail in details {
            if self.store.medication(detail.medication_id).await?.is_none() {
                warn!(target: TREATMENT,
                    msg = "Skipping prescription detail for unknown medication",
                    medication_id = detail.medication_id,
                );
                continue;
            }
            kept.push(detail);
        }

        let created = self
            .store
            .insert_prescription(NewPrescription {
                treatment_plan_id,
                notes,
                details: kept,
            })
            .await?;

        let scheduled = self.explode_details(created.id, &created.details).await?;
        info!(target: TREATMENT,
            msg = "Created prescription",
            prescription_id = created.id,
            treatment_plan_id,
            schedules = scheduled,
        );

        Ok(created)
    }

    async fn explode_details(
        &self,
        prescription_id: i64,
        details: &[PrescriptionDetail],
    ) -> Result<usize, Error> {
        let start = self.clock.today();
        let mut scheduled = 0;

        for detail in details {
            let frequency = match detail.frequency.as_deref() {
                Some(f) if !f.trim().is_empty() => f,
                _ => continue,
            };
            let duration_days = match detail.duration_days {
                Some(d) if d > 0 => d,
                _ => continue,
            };

            let times: Vec<NaiveTime> = parse_frequency(frequency)
                .into_iter()
                .filter_map(|token| match token {
                    TimeToken::Parsed(time) => Some(time),
                    TimeToken::Skipped { raw } => {
                        warn!(target: TREATMENT,
                            msg = "Skipping malformed intake time",
                            medication_id = detail.medication_id,
                            token = raw,
                        );
                        None
                    }
                })
                .collect();

            for day in 0..duration_days {
                let date = start + Duration::days(day as i64);
                for time in &times {
                    self.store
                        .insert_medication_schedule(NewMedicationSchedule {
                            prescription_id,
                            intake_time: date.and_time(*time),
                            status: IntakeStatus::Pending,
                        })
                        .await?;
                    scheduled += 1;
                }
            }
        }

        debug!(target: TREATMENT,
            msg = "Exploded prescription details",
            prescription_id,
            scheduled,
        );
        Ok(scheduled)
    }

    /// Creates a reminder authored by a staff member for a patient.
    pub async fn create_reminder(
        &self,
        reminder: NewReminder,
    ) -> Result<TreatmentReminder, Error> {
        if !self.store.staff_exists(reminder.created_by).await? {
            return Err(Error::NotFound {
                entity: "staff",
                id: reminder.created_by,
            });
        }
        if !self.store.patient_exists(reminder.patient_id).await? {
            return Err(Error::NotFound {
                entity: "patient",
                id: reminder.patient_id,
            });
        }

        self.store.insert_reminder(reminder).await
    }

    /// Marks a reminder completed. Completion is terminal.
    pub async fn complete_reminder(&self, id: i64) -> Result<TreatmentReminder, Error> {
        let mut reminder = self
            .store
            .reminder(id)
            .await?
            .ok_or(Error::NotFound {
                entity: "treatment_reminder",
                id,
            })?;

        reminder.status = ReminderStatus::Completed;
        self.store.save_reminder(&reminder).await?;
        Ok(reminder)
    }

    ///
    /// Backfills one PENDING medication reminder per schedule row of a
    /// prescription, due at the row's intake time. Returns how many were
    /// created.
    ///
    pub async fn reminders_from_schedules(
        &self,
        prescription_id: i64,
        patient_id: i64,
        created_by: i64,
    ) -> Result<usize, Error> {
        let schedules = self
            .store
            .medication_schedules_for_prescription(prescription_id)
            .await?;

        let mut created = 0;
        for schedule in &schedules {
            self.store
                .insert_reminder(NewReminder {
                    patient_id,
                    created_by,
                    reminder_type: ReminderType::Medication,
                    reminder_date: schedule.intake_time,
                    status: ReminderStatus::Pending,
                    message: Some("Time to take your medication".to_string()),
                })
                .await?;
            created += 1;
        }

        info!(target: TREATMENT,
            msg = "Created medication reminders",
            prescription_id,
            patient_id,
            count = created,
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveDateTime};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn service_at(store: Arc<MemoryStore>, now: NaiveDateTime) -> TreatmentService {
        TreatmentService::new(store, Arc::new(FixedClock(now)))
    }

    fn detail(medication_id: i64, frequency: &str, duration_days: u32) -> PrescriptionDetail {
        PrescriptionDetail {
            medication_id,
            dosage: Some("1 tablet".to_string()),
            frequency: Some(frequency.to_string()),
            duration_days: Some(duration_days),
            notes: None,
        }
    }

    #[test]
    fn frequency_tokens_parse_or_skip() {
        assert_eq!(
            parse_frequency("08:00, 20:00"),
            vec![
                TimeToken::Parsed(t(8, 0)),
                TimeToken::Parsed(t(20, 0)),
            ]
        );

        assert_eq!(
            parse_frequency("08:00,banana"),
            vec![
                TimeToken::Parsed(t(8, 0)),
                TimeToken::Skipped { raw: "banana".to_string() },
            ]
        );

        assert!(parse_frequency("").is_empty());
        assert!(parse_frequency(" , ,").is_empty());
    }

    #[tokio::test]
    async fn new_plan_closes_out_open_and_overlapping_plans() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);

        let service = service_at(store.clone(), d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());

        // Seeded through the store so only the call under test supersedes.
        let open = store
            .insert_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: d(2024, 1, 1),
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();
        let overlapping = store
            .insert_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: d(2024, 2, 1),
                end_date: Some(d(2024, 12, 31)),
                notes: None,
            })
            .await
            .unwrap();

        let new = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: d(2024, 6, 15),
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        let closed = d(2024, 6, 14);
        assert_eq!(store.plan(open.id).await.unwrap().unwrap().end_date, Some(closed));
        assert_eq!(
            store.plan(overlapping.id).await.unwrap().unwrap().end_date,
            Some(closed)
        );
        assert_eq!(store.plan(new.id).await.unwrap().unwrap().end_date, None);
    }

    #[tokio::test]
    async fn plan_ended_before_new_start_is_left_alone() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);

        let service = service_at(store.clone(), d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());

        let ended = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: d(2023, 1, 1),
                end_date: Some(d(2023, 12, 31)),
                notes: None,
            })
            .await
            .unwrap();

        service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: d(2024, 6, 15),
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        assert_eq!(
            store.plan(ended.id).await.unwrap().unwrap().end_date,
            Some(d(2023, 12, 31))
        );
    }

    #[tokio::test]
    async fn failed_validation_leaves_existing_plans_untouched() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);

        let service = service_at(store.clone(), d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());

        let open = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: d(2024, 1, 1),
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        let err = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: 999,
                start_date: d(2024, 6, 15),
                end_date: None,
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { entity: "arv_protocol", .. }));
        assert_eq!(store.plan(open.id).await.unwrap().unwrap().end_date, None);
    }

    #[tokio::test]
    async fn prescription_explodes_into_daily_intake_rows() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);
        let medication = store.add_medication("Dolutegravir");

        let today = d(2024, 6, 1);
        let service = service_at(store.clone(), today.and_hms_opt(9, 0, 0).unwrap());

        let plan = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: today,
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        let prescription = service
            .create_prescription(NewPrescription {
                treatment_plan_id: plan.id,
                notes: None,
                details: vec![detail(medication.id, "08:00,20:00", 7)],
            })
            .await
            .unwrap();

        let schedules = store
            .medication_schedules_for_prescription(prescription.id)
            .await
            .unwrap();

        assert_eq!(schedules.len(), 14);
        assert!(schedules.iter().all(|s| s.status == IntakeStatus::Pending));
        assert_eq!(schedules[0].intake_time, today.and_time(t(8, 0)));
        assert_eq!(
            schedules.last().unwrap().intake_time,
            d(2024, 6, 7).and_time(t(20, 0))
        );
    }

    #[tokio::test]
    async fn malformed_frequency_token_is_dropped_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);
        let medication = store.add_medication("Dolutegravir");

        let today = d(2024, 6, 1);
        let service = service_at(store.clone(), today.and_hms_opt(9, 0, 0).unwrap());

        let plan = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: today,
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        let prescription = service
            .create_prescription(NewPrescription {
                treatment_plan_id: plan.id,
                notes: None,
                details: vec![detail(medication.id, "08:00,banana,20:00", 3)],
            })
            .await
            .unwrap();

        let schedules = store
            .medication_schedules_for_prescription(prescription.id)
            .await
            .unwrap();

        // Two valid times per day over three days.
        assert_eq!(schedules.len(), 6);
    }

    #[tokio::test]
    async fn unknown_medication_detail_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);
        let medication = store.add_medication("Dolutegravir");

        let today = d(2024, 6, 1);
        let service = service_at(store.clone(), today.and_hms_opt(9, 0, 0).unwrap());

        let plan = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: today,
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        let prescription = service
            .create_prescription(NewPrescription {
                treatment_plan_id: plan.id,
                notes: None,
                details: vec![
                    detail(medication.id, "08:00", 2),
                    detail(999, "08:00", 2),
                ],
            })
            .await
            .unwrap();

        assert_eq!(prescription.details.len(), 1);
        assert_eq!(prescription.details[0].medication_id, medication.id);

        let schedules = store
            .medication_schedules_for_prescription(prescription.id)
            .await
            .unwrap();
        assert_eq!(schedules.len(), 2);
    }

    #[tokio::test]
    async fn empty_frequency_or_zero_duration_yields_no_rows() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);
        let medication = store.add_medication("Dolutegravir");

        let today = d(2024, 6, 1);
        let service = service_at(store.clone(), today.and_hms_opt(9, 0, 0).unwrap());

        let plan = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: today,
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();

        let prescription = service
            .create_prescription(NewPrescription {
                treatment_plan_id: plan.id,
                notes: None,
                details: vec![
                    PrescriptionDetail {
                        medication_id: medication.id,
                        dosage: None,
                        frequency: None,
                        duration_days: Some(5),
                        notes: None,
                    },
                    PrescriptionDetail {
                        medication_id: medication.id,
                        dosage: None,
                        frequency: Some("08:00".to_string()),
                        duration_days: Some(0),
                        notes: None,
                    },
                ],
            })
            .await
            .unwrap();

        let schedules = store
            .medication_schedules_for_prescription(prescription.id)
            .await
            .unwrap();
        assert!(schedules.is_empty());
    }

    #[tokio::test]
    async fn prescription_requires_existing_plan() {
        let store = Arc::new(MemoryStore::new());
        let service = service_at(store, d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());

        let err = service
            .create_prescription(NewPrescription {
                treatment_plan_id: 42,
                notes: None,
                details: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::NotFound { entity: "patient_treatment_plan", id: 42 }
        ));
    }

    #[tokio::test]
    async fn reminder_lifecycle_create_then_complete() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let staff = store.add_staff("Nurse Lan");

        let service = service_at(store.clone(), d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());

        let reminder = service
            .create_reminder(NewReminder {
                patient_id: patient.id,
                created_by: staff.id,
                reminder_type: ReminderType::FollowUp,
                reminder_date: d(2024, 6, 2).and_hms_opt(10, 0, 0).unwrap(),
                status: ReminderStatus::Pending,
                message: Some("CD4 follow up".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(reminder.status, ReminderStatus::Pending);

        let completed = service.complete_reminder(reminder.id).await.unwrap();
        assert_eq!(completed.status, ReminderStatus::Completed);

        let err = service.complete_reminder(999).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound { entity: "treatment_reminder", id: 999 }
        ));
    }

    #[tokio::test]
    async fn reminder_requires_existing_staff_and_patient() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();

        let service = service_at(store, d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());

        let err = service
            .create_reminder(NewReminder {
                patient_id: patient.id,
                created_by: 7,
                reminder_type: ReminderType::Appointment,
                reminder_date: d(2024, 6, 2).and_hms_opt(10, 0, 0).unwrap(),
                status: ReminderStatus::Pending,
                message: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { entity: "staff", .. }));
    }

    #[tokio::test]
    async fn medication_reminders_mirror_schedule_rows() {
        let store = Arc::new(MemoryStore::new());
        let patient = store.add_patient("P001", "Alex Tran", None, None).unwrap();
        let doctor = store.add_doctor("Dr Chi", None);
        let protocol = store.add_protocol("TDF/3TC/DTG", None);
        let medication = store.add_medication("Dolutegravir");
        let staff = store.add_staff("Nurse Lan");

        let today = d(2024, 6, 1);
        let service = service_at(store.clone(), today.and_hms_opt(9, 0, 0).unwrap());

        let plan = service
            .create_plan(NewTreatmentPlan {
                patient_id: patient.id,
                doctor_id: doctor.id,
                arv_protocol_id: protocol.id,
                start_date: today,
                end_date: None,
                notes: None,
            })
            .await
            .unwrap();
        let prescription = service
            .create_prescription(NewPrescription {
                treatment_plan_id: plan.id,
                notes: None,
                details: vec![detail(medication.id, "08:00,20:00", 2)],
            })
            .await
            .unwrap();

        let created = service
            .reminders_from_schedules(prescription.id, patient.id, staff.id)
            .await
            .unwrap();
        assert_eq!(created, 4);

        let reminders = store.reminders_for_patient(patient.id).await.unwrap();
        assert_eq!(reminders.len(), 4);
        assert!(reminders.iter().all(|r| {
            r.status == ReminderStatus::Pending && r.reminder_type == ReminderType::Medication
        }));
        assert_eq!(reminders[0].reminder_date, today.and_time(t(8, 0)));
    }
}

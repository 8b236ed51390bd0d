use crate::config::SlotsConfig;
use crate::error::Error;
use crate::log::SLOTS;
use crate::model::{Appointment, ConsultationTimeSlot, DoctorSchedule};
use crate::store::{ClinicStore, NewConsultationSlot};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;
use tracing::debug;

/// Hours of the fixed lab-test grid. Two blocks, lunch break in between.
const LAB_MORNING_HOURS: std::ops::RangeInclusive<u32> = 7..=11;
const LAB_AFTERNOON_HOURS: std::ops::RangeInclusive<u32> = 13..=16;

///
/// A bookable time point derived from a doctor's weekly availability.
///
/// `id` is a presentational sequence number over one generated list; it is
/// not stable across calls.
///
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TimeSlot {
    pub id: i64,
    pub time: NaiveTime,
    pub available: bool,
}

///
/// Bookable time points for a doctor on a calendar date.
///
/// Resolves the weekday, expands every schedule window for that weekday in
/// 30-minute steps (configurable), and marks a slot unavailable when an
/// existing appointment sits at exactly that time. A doctor with no windows
/// that day (or an unknown doctor) yields an empty list, not an error.
///
pub async fn available_slots(
    store: &dyn ClinicStore,
    doctor_id: i64,
    date: NaiveDate,
    config: &SlotsConfig,
) -> Result<Vec<TimeSlot>, Error> {
    let day_of_week = date.weekday();

    let schedules = store.doctor_schedules(doctor_id, day_of_week).await?;
    if schedules.is_empty() {
        debug!(target: SLOTS, msg = "No schedule windows", doctor_id, day = ?day_of_week);
        return Ok(Vec::new());
    }

    let appointments = store.appointments_on(doctor_id, date).await?;

    Ok(expand_windows(&schedules, &appointments, config.slot_step()))
}

///
/// Half-open expansion: a slot is emitted while `current < end_time`, so a
/// window whose length is not a multiple of the step still yields its final
/// partial slot, and no slot ever starts at or past the window end.
///
fn expand_windows(
    schedules: &[DoctorSchedule],
    appointments: &[Appointment],
    step: chrono::Duration,
) -> Vec<TimeSlot> {
    let mut slots = Vec::new();

    for schedule in schedules {
        let mut current = schedule.start_time;
        while current < schedule.end_time {
            let available = appointments.iter().all(|a| a.appointment_time != current);

            slots.push(TimeSlot {
                id: slots.len() as i64 + 1,
                time: current,
                available,
            });

            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 {
                // Stepping past midnight; the window cannot extend further.
                break;
            }
            current = next;
        }
    }

    slots
}

///
/// The fixed hourly grid published for lab-test bookings:
/// 07:00..=11:00 and 13:00..=16:00, nine slots. Sundays yield an empty list.
///
/// Existing lab bookings are NOT subtracted from the grid; the published
/// list is the same regardless of reservations.
///
pub fn lab_slots(date: NaiveDate) -> Vec<NaiveTime> {
    if date.weekday() == Weekday::Sun {
        return Vec::new();
    }

    LAB_MORNING_HOURS
        .chain(LAB_AFTERNOON_HOURS)
        .map(|hour| NaiveTime::from_hms_opt(hour, 0, 0).expect("fixed lab hours are valid"))
        .collect()
}

/// Materialized consultation slots for a doctor on one day.
pub async fn consultation_slots_on(
    store: &dyn ClinicStore,
    doctor_id: i64,
    date: NaiveDate,
) -> Result<Vec<ConsultationTimeSlot>, Error> {
    let start = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
    let end = date.and_hms_opt(23, 59, 59).expect("end of day is valid");
    store
        .consultation_slots_between(doctor_id, start, end)
        .await
}

pub async fn create_consultation_slot(
    store: &dyn ClinicStore,
    slot: NewConsultationSlot,
) -> Result<ConsultationTimeSlot, Error> {
    if !store.doctor_exists(slot.doctor_id).await? {
        return Err(Error::NotFound {
            entity: "doctor",
            id: slot.doctor_id,
        });
    }

    if slot.start_time >= slot.end_time {
        return Err(Error::InvalidWindow {
            start: slot.start_time.to_string(),
            end: slot.end_time.to_string(),
        });
    }

    store.insert_consultation_slot(slot).await
}

/// Exclusive booking: a slot can be taken once.
pub async fn book_consultation_slot(
    store: &dyn ClinicStore,
    id: i64,
) -> Result<ConsultationTimeSlot, Error> {
    let mut slot = store
        .consultation_slot(id)
        .await?
        .ok_or(Error::NotFound {
            entity: "consultation_time_slot",
            id,
        })?;

    if slot.is_booked {
        return Err(Error::SlotAlreadyBooked { id });
    }

    slot.is_booked = true;
    store.save_consultation_slot(&slot).await?;
    Ok(slot)
}

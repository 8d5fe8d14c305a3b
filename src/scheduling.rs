// Appointment slots: 08:00 to 18:00 inclusive, every 30 minutes

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::Appointment;

const DAY_START_MINUTES: u32 = 8 * 60;
const DAY_END_MINUTES: u32 = 18 * 60;
const SLOT_MINUTES: u32 = 30;

/// Every bookable slot of a day, in order
pub fn day_slots() -> Vec<NaiveTime> {
    (DAY_START_MINUTES..=DAY_END_MINUTES)
        .step_by(SLOT_MINUTES as usize)
        .filter_map(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
        .collect()
}

pub fn format_slot(slot: NaiveTime) -> String {
    slot.format("%H:%M").to_string()
}

/// Slots held by active appointments. Cancelled appointments free their
/// slot; `exclude_id` lets an appointment being moved ignore itself.
pub fn taken_slots<'a, I>(appointments: I, exclude_id: Option<&str>) -> Vec<NaiveTime>
where
    I: IntoIterator<Item = &'a Appointment>,
{
    appointments
        .into_iter()
        .filter(|a| a.status.is_active())
        .filter(|a| exclude_id != Some(a.id.as_str()))
        .filter_map(Appointment::slot)
        .collect()
}

/// Free slots on `date` given the slots already taken that day.
/// `now` is the business-local current time: past days have no slots and
/// today only keeps slots that have not started yet.
pub fn available_hours(date: NaiveDate, taken: &[NaiveTime], now: NaiveDateTime) -> Vec<NaiveTime> {
    if date < now.date() {
        return vec![];
    }
    day_slots()
        .into_iter()
        .filter(|slot| !taken.contains(slot))
        .filter(|slot| date > now.date() || *slot > now.time())
        .collect()
}

/// Why a requested slot cannot be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// Not on the 30-minute grid between 08:00 and 18:00
    OffGrid,
    /// Already started or on a past day
    Past,
    /// Held by another active appointment
    Taken,
}

impl SlotError {
    pub fn message(&self) -> &'static str {
        match self {
            SlotError::OffGrid => "time must be a half-hour slot between 08:00 and 18:00",
            SlotError::Past => "that date and time have already passed",
            SlotError::Taken => "that time is no longer available",
        }
    }
}

/// Ok exactly when `time` is in `available_hours(date, taken, now)`
pub fn check_slot(
    date: NaiveDate,
    time: NaiveTime,
    taken: &[NaiveTime],
    now: NaiveDateTime,
) -> Result<(), SlotError> {
    if !day_slots().contains(&time) {
        return Err(SlotError::OffGrid);
    }
    if date.and_time(time) <= now {
        return Err(SlotError::Past);
    }
    if taken.contains(&time) {
        return Err(SlotError::Taken);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, mo: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, mo, day).unwrap()
    }

    fn appointment(id: &str, time: &str, status: RequestStatus) -> Appointment {
        Appointment {
            id: id.to_string(),
            service_id: "svc".to_string(),
            client_name: "Ana".to_string(),
            date: "2025-06-02".to_string(),
            time: time.to_string(),
            service_name: "Pintura".to_string(),
            status,
            phone: "5512345678".to_string(),
            email: "ana@example.com".to_string(),
            address: "Calle 3".to_string(),
            description: None,
            requested_at: None,
        }
    }

    #[test]
    fn test_day_has_21_slots() {
        let slots = day_slots();
        assert_eq!(slots.len(), 21);
        assert_eq!(slots.first(), Some(&t(8, 0)));
        assert_eq!(slots[1], t(8, 30));
        assert_eq!(slots.last(), Some(&t(18, 0)));
    }

    #[test]
    fn test_taken_slots_are_excluded() {
        let now = d(2025, 6, 1).and_time(t(12, 0));
        let hours = available_hours(d(2025, 6, 2), &[t(8, 0), t(12, 30)], now);
        assert_eq!(hours.len(), 19);
        assert!(!hours.contains(&t(8, 0)));
        assert!(!hours.contains(&t(12, 30)));
        assert_eq!(format_slot(hours[0]), "08:30");
    }

    #[test]
    fn test_today_only_offers_future_slots() {
        let now = d(2025, 6, 2).and_time(t(16, 45));
        let hours = available_hours(d(2025, 6, 2), &[], now);
        let formatted: Vec<_> = hours.into_iter().map(format_slot).collect();
        assert_eq!(formatted, vec!["17:00", "17:30", "18:00"]);
    }

    #[test]
    fn test_slot_starting_now_is_gone() {
        let now = d(2025, 6, 2).and_time(t(17, 0));
        assert_eq!(check_slot(d(2025, 6, 2), t(17, 0), &[], now), Err(SlotError::Past));
        assert_eq!(check_slot(d(2025, 6, 2), t(17, 30), &[], now), Ok(()));
    }

    #[test]
    fn test_past_day_has_no_slots() {
        let now = d(2025, 6, 2).and_time(t(7, 0));
        assert!(available_hours(d(2025, 6, 1), &[], now).is_empty());
    }

    #[test]
    fn test_off_grid_time_is_not_bookable() {
        let now = d(2025, 6, 1).and_time(t(7, 0));
        assert_eq!(check_slot(d(2025, 6, 2), t(9, 15), &[], now), Err(SlotError::OffGrid));
        assert_eq!(check_slot(d(2025, 6, 2), t(18, 30), &[], now), Err(SlotError::OffGrid));
        assert_eq!(check_slot(d(2025, 6, 2), t(18, 0), &[], now), Ok(()));
    }

    #[test]
    fn test_check_slot_reasons() {
        let now = d(2025, 6, 2).and_time(t(12, 0));
        let day = d(2025, 6, 3);
        assert_eq!(check_slot(day, t(9, 10), &[], now), Err(SlotError::OffGrid));
        assert_eq!(check_slot(d(2025, 6, 2), t(11, 30), &[], now), Err(SlotError::Past));
        assert_eq!(check_slot(day, t(9, 0), &[t(9, 0)], now), Err(SlotError::Taken));
        assert_eq!(check_slot(day, t(9, 0), &[t(9, 30)], now), Ok(()));
    }

    #[test]
    fn test_check_slot_agrees_with_available_hours() {
        let now = d(2025, 6, 2).and_time(t(13, 0));
        let taken = [t(14, 0), t(8, 0)];
        for date in [d(2025, 6, 1), d(2025, 6, 2), d(2025, 6, 3)] {
            for slot in day_slots() {
                assert_eq!(
                    check_slot(date, slot, &taken, now).is_ok(),
                    available_hours(date, &taken, now).contains(&slot)
                );
            }
        }
    }

    #[test]
    fn test_cancelled_and_excluded_appointments_free_slots() {
        let appointments = vec![
            appointment("a", "09:00", RequestStatus::Pending),
            appointment("b", "10:00", RequestStatus::Cancelled),
            appointment("c", "11:00", RequestStatus::Attended),
            appointment("d", "mediodía", RequestStatus::Pending),
        ];
        assert_eq!(taken_slots(&appointments, None), vec![t(9, 0), t(11, 0)]);
        assert_eq!(taken_slots(&appointments, Some("a")), vec![t(11, 0)]);
    }

    #[test]
    fn test_legacy_twelve_hour_booking_holds_its_slot() {
        let appointments = vec![
            appointment("a", "12:00 p. m.", RequestStatus::Pending),
            appointment("b", "08:00 AM", RequestStatus::Attended),
        ];
        let taken = taken_slots(&appointments, None);
        assert_eq!(taken, vec![t(12, 0), t(8, 0)]);

        let now = d(2030, 6, 1).and_time(t(9, 0));
        let day = d(2030, 6, 2);
        let hours = available_hours(day, &taken, now);
        assert!(!hours.contains(&t(12, 0)));
        assert!(!hours.contains(&t(8, 0)));
        assert_eq!(check_slot(day, t(12, 0), &taken, now), Err(SlotError::Taken));
    }
}

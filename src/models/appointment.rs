// Appointment (cita) models
// Path: servicios/{service_id}/citas/{appointment_id}

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::status::RequestStatus;

/// Appointment as stored in Firestore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// Document ID
    pub id: String,
    /// Parent service document ID
    pub service_id: String,
    pub client_name: String,
    /// YYYY-MM-DD, kept as stored
    pub date: String,
    /// HH:MM, kept as stored
    pub time: String,
    /// Service name, denormalized at creation
    pub service_name: String,
    #[serde(default)]
    pub status: RequestStatus,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Server timestamp set by the public request form
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Booked slot. Accepts HH:MM and the 12-hour browser-locale forms the
    /// old booking form stored ("08:00 AM", "12:00 p. m.").
    pub fn slot(&self) -> Option<NaiveTime> {
        parse_stored_time(&self.time)
    }

    /// Chronological order for admin lists
    pub fn sort_chronologically(items: &mut [Appointment]) {
        items.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
    }
}

fn parse_stored_time(raw: &str) -> Option<NaiveTime> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_lowercase();

    let (clock, pm) = if let Some(clock) = compact.strip_suffix("am") {
        (clock, Some(false))
    } else if let Some(clock) = compact.strip_suffix("pm") {
        (clock, Some(true))
    } else {
        (compact.as_str(), None)
    };

    let time = NaiveTime::parse_from_str(clock, "%H:%M").ok()?;
    match pm {
        None => Some(time),
        Some(pm) => {
            let hour = time.hour();
            if !(1..=12).contains(&hour) {
                return None;
            }
            NaiveTime::from_hms_opt(hour % 12 + if pm { 12 } else { 0 }, time.minute(), 0)
        }
    }
}

/// Validated appointment ready to be written
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub client_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub description: Option<String>,
    /// Set a server timestamp (public form) or leave unset (admin form)
    pub stamp_request: bool,
}

/// Request body for the admin "add appointment" form
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub service_id: Option<String>,
    pub client_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Request body for a client cancelling their own appointment
#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub phone: Option<String>,
}

/// Request body for a client moving their own appointment
#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Query for the available-hours endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableHoursQuery {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableHoursResponse {
    pub date: String,
    pub hours: Vec<String>,
}

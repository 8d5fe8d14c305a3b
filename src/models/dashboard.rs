// Admin dashboard summary

use serde::Serialize;

use super::{Appointment, Quotation, RequestStatus};

const RECENT_ACTIVITY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Appointment,
    Quotation,
}

/// One line of the "recent activity" panel
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub id: String,
    pub service_id: String,
    pub service_name: String,
    pub client_name: String,
    /// Appointment date or quotation request date (YYYY-MM-DD)
    pub date: Option<String>,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub pending_appointments: usize,
    pub pending_quotations: usize,
    pub recent_activity: Vec<Activity>,
}

impl From<&Appointment> for Activity {
    fn from(a: &Appointment) -> Self {
        Self {
            kind: ActivityKind::Appointment,
            id: a.id.clone(),
            service_id: a.service_id.clone(),
            service_name: a.service_name.clone(),
            client_name: a.client_name.clone(),
            date: Some(a.date.clone()).filter(|d| !d.is_empty()),
            status: a.status,
        }
    }
}

impl From<&Quotation> for Activity {
    fn from(q: &Quotation) -> Self {
        Self {
            kind: ActivityKind::Quotation,
            id: q.id.clone(),
            service_id: q.service_id.clone(),
            service_name: q.service_name.clone(),
            client_name: q.client_name.clone(),
            date: q.requested_on.map(|d| d.format("%Y-%m-%d").to_string()),
            status: q.status,
        }
    }
}

impl DashboardSummary {
    /// Build the summary from the pending records of every service
    pub fn from_pending(appointments: &[Appointment], quotations: &[Quotation]) -> Self {
        let mut recent_activity: Vec<Activity> = appointments
            .iter()
            .map(Activity::from)
            .chain(quotations.iter().map(Activity::from))
            .collect();
        // Undated entries sink to the bottom
        recent_activity.sort_by(|a, b| b.date.cmp(&a.date));
        recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

        Self {
            pending_appointments: appointments.len(),
            pending_quotations: quotations.len(),
            recent_activity,
        }
    }
}

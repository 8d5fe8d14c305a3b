// Routes module

pub mod admin_services;
pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod quotations;
pub mod requests;
pub mod services;

use chrono::{NaiveDate, NaiveTime};

use crate::error::{internal, ApiError};
use crate::models::Service;
use crate::scheduling::{self, SlotError};
use crate::AppState;

pub use admin_services::admin_services_routes;
pub use appointments::appointments_routes;
pub use auth::auth_routes;
pub use dashboard::dashboard_routes;
pub use health::health_routes;
pub use quotations::quotations_routes;
pub use requests::requests_routes;
pub use services::services_routes;

/// Parent service (without images) or 404
async fn require_service(state: &AppState, service_id: &str) -> Result<Service, ApiError> {
    state
        .firestore
        .get_service_header(service_id)
        .await
        .map_err(internal("Failed to load service"))?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))
}

/// Check that `date time` is a free, future slot of the service.
/// `moving` is the appointment being rescheduled, which does not block itself.
async fn ensure_bookable(
    state: &AppState,
    service_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    moving: Option<&str>,
) -> Result<(), ApiError> {
    let booked = state
        .firestore
        .appointments_on_date(service_id, date)
        .await
        .map_err(internal("Failed to load booked hours"))?;
    let taken = scheduling::taken_slots(&booked, moving);

    scheduling::check_slot(date, time, &taken, state.local_now()).map_err(ApiError::from)
}

/// A taken slot is a conflict; a slot that cannot exist is bad input
impl From<SlotError> for ApiError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::Taken => ApiError::Conflict(e.message().to_string()),
            SlotError::OffGrid | SlotError::Past => ApiError::validation(e.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_slot_errors_map_to_status_codes() {
        assert_eq!(ApiError::from(SlotError::Taken).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(SlotError::OffGrid).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(SlotError::Past).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(SlotError::Taken).to_string(),
            SlotError::Taken.message()
        );
    }
}

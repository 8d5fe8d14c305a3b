// Admin appointment routes - the "citas" table, its live feed and the
// "agregar cita" form
// Endpoints: GET  /v1/admin/services/:service_id/appointments
//            GET  /v1/admin/services/:service_id/appointments/stream
//            POST /v1/admin/appointments
//            POST /v1/admin/services/:service_id/appointments/:appointment_id/attend
//            POST /v1/admin/services/:service_id/appointments/:appointment_id/cancel

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;

use super::require_service;
use crate::auth::AuthUser;
use crate::error::{internal, ApiError};
use crate::models::{
    Appointment, CreateAppointmentRequest, ListFilterQuery, NewAppointment, RecordFilter,
    RequestStatus,
};
use crate::scheduling;
use crate::validation;
use crate::AppState;

/// How often the live feed re-reads the collection
const STREAM_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn parse_filter(query: ListFilterQuery) -> Result<RecordFilter, ApiError> {
    RecordFilter::try_from(query).map_err(ApiError::Validation)
}

/// GET /v1/admin/services/:service_id/appointments?status=&phone=
async fn list_appointments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(service_id): Path<String>,
    Query(query): Query<ListFilterQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let filter = parse_filter(query)?;
    let appointments = state
        .firestore
        .list_appointments(&service_id)
        .await
        .map_err(internal("Failed to list appointments"))?;

    let appointments = filter.apply(appointments);
    tracing::info!(
        "Admin {} listed {} appointments of service {}",
        user.uid,
        appointments.len(),
        service_id
    );
    Ok(Json(appointments))
}

/// Last list sent on a live feed
#[derive(Debug, Default)]
struct FeedState {
    last_payload: Option<String>,
}

impl FeedState {
    /// The payload to send, or None when the client already has it
    fn changed(&mut self, payload: String) -> Option<String> {
        if self.last_payload.as_deref() == Some(payload.as_str()) {
            return None;
        }
        self.last_payload = Some(payload.clone());
        Some(payload)
    }
}

/// GET /v1/admin/services/:service_id/appointments/stream?status=&phone=
/// Sends the filtered list as an `update` event, then again whenever it changes.
async fn stream_appointments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(service_id): Path<String>,
    Query(query): Query<ListFilterQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = parse_filter(query)?;
    tracing::info!("Admin {} watching appointments of service {}", user.uid, service_id);

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(STREAM_POLL_INTERVAL);
        let mut feed = FeedState::default();

        loop {
            ticker.tick().await;

            let appointments = match state.firestore.list_appointments(&service_id).await {
                Ok(items) => filter.apply(items),
                Err(e) => {
                    tracing::warn!("Appointment feed for {} failed to poll: {}", service_id, e);
                    continue;
                }
            };
            let payload = match serde_json::to_string(&appointments) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!("Failed to encode appointment feed: {}", e);
                    continue;
                }
            };

            if let Some(payload) = feed.changed(payload) {
                yield Ok::<Event, Infallible>(Event::default().event("update").data(payload));
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Validated admin form plus the target service
fn new_appointment(request: &CreateAppointmentRequest) -> Result<(String, NewAppointment), ApiError> {
    let service_id = validation::require("service_id", request.service_id.as_deref())?;
    let (client_name, email, phone) = validation::contact(
        request.client_name.as_deref(),
        request.email.as_deref(),
        request.phone.as_deref(),
    )?;
    let address = validation::require("address", request.address.as_deref())?;
    let date = validation::require("date", request.date.as_deref())?;
    let time = validation::require("time", request.time.as_deref())?;

    Ok((
        service_id,
        NewAppointment {
            client_name,
            date: validation::parse_date("date", &date)?,
            time: validation::parse_time("time", &time)?,
            phone,
            email,
            address,
            description: None,
            stamp_request: false,
        },
    ))
}

/// POST /v1/admin/appointments
/// Admins may book outside the public grid, but never on top of another
/// active appointment.
async fn create_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let (service_id, appointment) = new_appointment(&request)?;
    let service = require_service(&state, &service_id).await?;

    let booked = state
        .firestore
        .appointments_on_date(&service_id, appointment.date)
        .await
        .map_err(internal("Failed to load booked hours"))?;
    if scheduling::taken_slots(&booked, None).contains(&appointment.time) {
        return Err(ApiError::Conflict(
            "Another appointment is already booked at that date and time".to_string(),
        ));
    }

    let created = state
        .firestore
        .create_appointment(&service_id, &service.name, &appointment)
        .await
        .map_err(internal("Failed to create appointment"))?;

    tracing::info!("Admin {} added appointment {}", user.uid, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn set_status(
    state: &AppState,
    service_id: &str,
    appointment_id: &str,
    status: RequestStatus,
) -> Result<Json<Appointment>, ApiError> {
    state
        .firestore
        .set_appointment_status(service_id, appointment_id, status)
        .await
        .map_err(internal("Failed to update appointment status"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))
}

/// POST /v1/admin/services/:service_id/appointments/:appointment_id/attend
async fn attend_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path((service_id, appointment_id)): Path<(String, String)>,
) -> Result<Json<Appointment>, ApiError> {
    tracing::info!("Admin {} marking appointment {} attended", user.uid, appointment_id);
    set_status(&state, &service_id, &appointment_id, RequestStatus::Attended).await
}

/// POST /v1/admin/services/:service_id/appointments/:appointment_id/cancel
async fn cancel_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path((service_id, appointment_id)): Path<(String, String)>,
) -> Result<Json<Appointment>, ApiError> {
    tracing::info!("Admin {} cancelling appointment {}", user.uid, appointment_id);
    set_status(&state, &service_id, &appointment_id, RequestStatus::Cancelled).await
}

pub fn appointments_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/appointments", post(create_appointment))
        .route(
            "/v1/admin/services/:service_id/appointments",
            get(list_appointments),
        )
        .route(
            "/v1/admin/services/:service_id/appointments/stream",
            get(stream_appointments),
        )
        .route(
            "/v1/admin/services/:service_id/appointments/:appointment_id/attend",
            post(attend_appointment),
        )
        .route(
            "/v1/admin/services/:service_id/appointments/:appointment_id/cancel",
            post(cancel_appointment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn test_feed_sends_only_changes() {
        let mut feed = FeedState::default();
        assert_eq!(feed.changed("[]".to_string()).as_deref(), Some("[]"));
        assert_eq!(feed.changed("[]".to_string()), None);

        let one = r#"[{"id":"a1","estado":"Pendiente"}]"#.to_string();
        assert_eq!(feed.changed(one.clone()), Some(one.clone()));
        assert_eq!(feed.changed(one), None);

        // Going back to an earlier list is still a change
        assert_eq!(feed.changed("[]".to_string()).as_deref(), Some("[]"));
    }

    fn request() -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            service_id: Some("svc".to_string()),
            client_name: Some("Ana".to_string()),
            date: Some("2025-06-02".to_string()),
            time: Some("07:15".to_string()),
            phone: Some("5512345678".to_string()),
            email: Some("ana@example.com".to_string()),
            address: Some("Calle 2".to_string()),
        }
    }

    #[test]
    fn test_admin_form_accepts_off_grid_times() {
        let (service_id, appointment) = new_appointment(&request()).unwrap();
        assert_eq!(service_id, "svc");
        assert_eq!(appointment.time, NaiveTime::from_hms_opt(7, 15, 0).unwrap());
        assert!(!appointment.stamp_request);
    }

    #[test]
    fn test_admin_form_requires_every_field() {
        let missing_service = CreateAppointmentRequest {
            service_id: None,
            ..request()
        };
        assert_eq!(
            new_appointment(&missing_service).unwrap_err().to_string(),
            "service_id is required"
        );

        let bad_time = CreateAppointmentRequest {
            time: Some("7pm".to_string()),
            ..request()
        };
        assert!(new_appointment(&bad_time).is_err());
    }

    #[test]
    fn test_unknown_status_filter_is_rejected() {
        let query = ListFilterQuery {
            status: Some("archived".to_string()),
            phone: None,
        };
        assert_eq!(parse_filter(query).unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}

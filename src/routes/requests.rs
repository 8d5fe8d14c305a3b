// Public request routes - the "cita o cotización" form and the client
// self-service modals (look up, cancel or move an appointment, track a quote)
// Endpoints: POST /v1/services/:service_id/requests
//            GET  /v1/services/:service_id/appointments/lookup
//            POST /v1/services/:service_id/appointments/:appointment_id/cancel
//            POST /v1/services/:service_id/appointments/:appointment_id/reschedule
//            GET  /v1/services/:service_id/quotations/lookup

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{ensure_bookable, require_service};
use crate::error::{internal, ApiError};
use crate::models::{
    Appointment, CancelAppointmentRequest, NewAppointment, NewQuotation, PhoneLookupQuery,
    Quotation, RequestKind, RequestStatus, RescheduleAppointmentRequest, ServiceRequest,
    ServiceRequestResponse,
};
use crate::validation;
use crate::AppState;

/// Validated public submission
enum Submission {
    Cita(NewAppointment),
    Cotizacion(NewQuotation),
}

impl TryFrom<&ServiceRequest> for Submission {
    type Error = ApiError;

    fn try_from(request: &ServiceRequest) -> Result<Self, Self::Error> {
        let (client_name, email, phone) = validation::contact(
            request.client_name.as_deref(),
            request.email.as_deref(),
            request.phone.as_deref(),
        )?;

        match request.kind {
            RequestKind::Cita => {
                let address = validation::require("address", request.address.as_deref())?;
                let date = validation::require("date", request.date.as_deref())?;
                let time = validation::require("time", request.time.as_deref())?;
                Ok(Submission::Cita(NewAppointment {
                    client_name,
                    date: validation::parse_date("date", &date)?,
                    time: validation::parse_time("time", &time)?,
                    phone,
                    email,
                    address,
                    description: validation::optional(request.description.as_deref()),
                    stamp_request: true,
                }))
            }
            RequestKind::Cotizacion => Ok(Submission::Cotizacion(NewQuotation {
                client_name,
                email,
                address: validation::optional(request.address.as_deref()),
                phone,
                description: validation::require("description", request.description.as_deref())?,
                requested_on: None,
                estimated_cost: None,
            })),
        }
    }
}

/// POST /v1/services/:service_id/requests
async fn submit_request(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Json(request): Json<ServiceRequest>,
) -> Result<(StatusCode, Json<ServiceRequestResponse>), ApiError> {
    let submission = Submission::try_from(&request)?;
    let service = require_service(&state, &service_id).await?;

    let (id, status) = match submission {
        Submission::Cita(appointment) => {
            ensure_bookable(&state, &service_id, appointment.date, appointment.time, None).await?;
            let created = state
                .firestore
                .create_appointment(&service_id, &service.name, &appointment)
                .await
                .map_err(internal("Failed to create appointment"))?;
            (created.id, created.status)
        }
        Submission::Cotizacion(quotation) => {
            let created = state
                .firestore
                .create_quotation(&service_id, &service.name, &quotation)
                .await
                .map_err(internal("Failed to create quotation"))?;
            (created.id, created.status)
        }
    };

    tracing::info!("New public {:?} {} for service {}", request.kind, id, service_id);
    Ok((
        StatusCode::CREATED,
        Json(ServiceRequestResponse {
            kind: request.kind,
            id,
            status,
        }),
    ))
}

fn lookup_phone(phone: Option<&str>) -> Result<String, ApiError> {
    let phone = validation::require("phone", phone)?;
    validation::validate_phone(&phone)?;
    Ok(phone)
}

/// GET /v1/services/:service_id/appointments/lookup?phone=
async fn lookup_appointments(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(query): Query<PhoneLookupQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let phone = lookup_phone(query.phone.as_deref())?;
    let appointments = state
        .firestore
        .appointments_by_phone(&service_id, &phone)
        .await
        .map_err(internal("Failed to look up appointments"))?;
    Ok(Json(appointments))
}

/// GET /v1/services/:service_id/quotations/lookup?phone=
async fn lookup_quotations(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(query): Query<PhoneLookupQuery>,
) -> Result<Json<Vec<Quotation>>, ApiError> {
    let phone = lookup_phone(query.phone.as_deref())?;
    let quotations = state
        .firestore
        .quotations_by_phone(&service_id, &phone)
        .await
        .map_err(internal("Failed to look up quotations"))?;
    Ok(Json(quotations))
}

/// The caller's own appointment; a wrong phone looks the same as a missing one
async fn owned_appointment(
    state: &AppState,
    service_id: &str,
    appointment_id: &str,
    phone: &str,
) -> Result<Appointment, ApiError> {
    state
        .firestore
        .get_appointment(service_id, appointment_id)
        .await
        .map_err(internal("Failed to load appointment"))?
        .filter(|a| a.phone == phone)
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))
}

/// Whether a client cancel has to write anything. Cancelling twice is a
/// no-op; an attended appointment cannot be cancelled.
fn needs_cancelling(status: RequestStatus) -> Result<bool, ApiError> {
    match status {
        RequestStatus::Pending => Ok(true),
        RequestStatus::Cancelled => Ok(false),
        RequestStatus::Attended => Err(ApiError::Conflict(
            "An attended appointment cannot be cancelled".to_string(),
        )),
    }
}

fn ensure_reschedulable(status: RequestStatus) -> Result<(), ApiError> {
    if status == RequestStatus::Pending {
        Ok(())
    } else {
        Err(ApiError::Conflict(
            "Only pending appointments can be rescheduled".to_string(),
        ))
    }
}

/// POST /v1/services/:service_id/appointments/:appointment_id/cancel
async fn cancel_appointment(
    State(state): State<AppState>,
    Path((service_id, appointment_id)): Path<(String, String)>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let phone = validation::require("phone", request.phone.as_deref())?;
    let appointment = owned_appointment(&state, &service_id, &appointment_id, &phone).await?;

    if !needs_cancelling(appointment.status)? {
        return Ok(Json(appointment));
    }

    state
        .firestore
        .set_appointment_status(&service_id, &appointment_id, RequestStatus::Cancelled)
        .await
        .map_err(internal("Failed to cancel appointment"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))
}

/// POST /v1/services/:service_id/appointments/:appointment_id/reschedule
async fn reschedule_appointment(
    State(state): State<AppState>,
    Path((service_id, appointment_id)): Path<(String, String)>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let phone = validation::require("phone", request.phone.as_deref())?;
    let date = validation::require("date", request.date.as_deref())?;
    let time = validation::require("time", request.time.as_deref())?;
    let date = validation::parse_date("date", &date)?;
    let time = validation::parse_time("time", &time)?;

    let appointment = owned_appointment(&state, &service_id, &appointment_id, &phone).await?;
    ensure_reschedulable(appointment.status)?;

    ensure_bookable(&state, &service_id, date, time, Some(&appointment_id)).await?;

    state
        .firestore
        .reschedule_appointment(&service_id, &appointment_id, date, time)
        .await
        .map_err(internal("Failed to reschedule appointment"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))
}

pub fn requests_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/services/:service_id/requests", post(submit_request))
        .route(
            "/v1/services/:service_id/appointments/lookup",
            get(lookup_appointments),
        )
        .route(
            "/v1/services/:service_id/appointments/:appointment_id/cancel",
            post(cancel_appointment),
        )
        .route(
            "/v1/services/:service_id/appointments/:appointment_id/reschedule",
            post(reschedule_appointment),
        )
        .route(
            "/v1/services/:service_id/quotations/lookup",
            get(lookup_quotations),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ServiceRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_cita_requires_address_date_and_time() {
        let missing_date = request(serde_json::json!({
            "kind": "cita",
            "client_name": "Ana",
            "email": "ana@example.com",
            "phone": "5512345678",
            "address": "Calle 1",
            "time": "10:00"
        }));
        let err = Submission::try_from(&missing_date).err().unwrap();
        assert_eq!(err.to_string(), "date is required");

        let complete = request(serde_json::json!({
            "kind": "cita",
            "client_name": "Ana",
            "email": "ana@example.com",
            "phone": "5512345678",
            "address": "Calle 1",
            "date": "2030-01-15",
            "time": "10:00",
            "description": "  "
        }));
        match Submission::try_from(&complete).unwrap() {
            Submission::Cita(a) => {
                assert_eq!(a.address, "Calle 1");
                assert_eq!(a.description, None);
                assert!(a.stamp_request);
            }
            Submission::Cotizacion(_) => panic!("expected a cita"),
        }
    }

    #[test]
    fn test_cotizacion_needs_description_not_address() {
        let quote = request(serde_json::json!({
            "kind": "cotizacion",
            "client_name": "Luis",
            "email": "luis@example.com",
            "phone": "5587654321",
            "description": "Impermeabilizar 80 m2"
        }));
        match Submission::try_from(&quote).unwrap() {
            Submission::Cotizacion(q) => {
                assert_eq!(q.address, None);
                assert_eq!(q.requested_on, None);
                assert_eq!(q.estimated_cost, None);
            }
            Submission::Cita(_) => panic!("expected a cotizacion"),
        }

        let no_description = request(serde_json::json!({
            "kind": "cotizacion",
            "client_name": "Luis",
            "email": "luis@example.com",
            "phone": "5587654321"
        }));
        assert!(Submission::try_from(&no_description).is_err());
    }

    #[test]
    fn test_contact_is_validated_first() {
        let bad_phone = request(serde_json::json!({
            "kind": "cotizacion",
            "client_name": "Luis",
            "email": "luis@example.com",
            "phone": "55-8765",
            "description": "x"
        }));
        let err = Submission::try_from(&bad_phone).err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_client_cancel_by_status() {
        assert!(needs_cancelling(RequestStatus::Pending).unwrap());
        assert!(!needs_cancelling(RequestStatus::Cancelled).unwrap());
        assert_eq!(
            needs_cancelling(RequestStatus::Attended).unwrap_err().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_only_pending_appointments_move() {
        assert!(ensure_reschedulable(RequestStatus::Pending).is_ok());
        for status in [RequestStatus::Attended, RequestStatus::Cancelled] {
            assert_eq!(
                ensure_reschedulable(status).unwrap_err().status(),
                StatusCode::CONFLICT
            );
        }
    }

    #[test]
    fn test_lookup_phone() {
        assert_eq!(lookup_phone(Some(" 5512345678 ")).unwrap(), "5512345678");
        assert!(lookup_phone(Some("123")).is_err());
        assert!(lookup_phone(None).is_err());
    }
}

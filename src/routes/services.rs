// Public catalog routes
// Endpoints: GET /v1/services, GET /v1/services/:service_id,
//            GET /v1/services/:service_id/available-hours

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use super::require_service;
use crate::error::{internal, ApiError};
use crate::models::{AvailableHoursQuery, AvailableHoursResponse, Service};
use crate::scheduling;
use crate::validation;
use crate::AppState;

/// GET /v1/services - every service with its images, newest first
async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<Service>>, ApiError> {
    let services = state
        .firestore
        .list_services()
        .await
        .map_err(internal("Failed to list services"))?;
    Ok(Json(services))
}

/// GET /v1/services/:service_id
async fn get_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<Json<Service>, ApiError> {
    state
        .firestore
        .get_service(&service_id)
        .await
        .map_err(internal("Failed to load service"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))
}

/// GET /v1/services/:service_id/available-hours?date=YYYY-MM-DD
async fn available_hours(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(query): Query<AvailableHoursQuery>,
) -> Result<Json<AvailableHoursResponse>, ApiError> {
    let raw = validation::require("date", query.date.as_deref())?;
    let date = validation::parse_date("date", &raw)?;
    require_service(&state, &service_id).await?;

    let booked = state
        .firestore
        .appointments_on_date(&service_id, date)
        .await
        .map_err(internal("Failed to load booked hours"))?;
    let taken = scheduling::taken_slots(&booked, None);

    let hours = scheduling::available_hours(date, &taken, state.local_now())
        .into_iter()
        .map(scheduling::format_slot)
        .collect::<Vec<_>>();

    tracing::info!(
        "Service {} has {} free slots on {} ({} booked)",
        service_id,
        hours.len(),
        date,
        taken.len()
    );

    Ok(Json(AvailableHoursResponse {
        date: date.format(validation::DATE_FORMAT).to_string(),
        hours,
    }))
}

pub fn services_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/services", get(list_services))
        .route("/v1/services/:service_id", get(get_service))
        .route("/v1/services/:service_id/available-hours", get(available_hours))
}

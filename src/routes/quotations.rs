// Admin quotation routes - the "cotizaciones" table and the
// "agregar cotización" form
// Endpoints: GET  /v1/admin/services/:service_id/quotations
//            POST /v1/admin/quotations
//            PUT  /v1/admin/services/:service_id/quotations/:quotation_id/estimate
//            POST /v1/admin/services/:service_id/quotations/:quotation_id/cancel

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use super::require_service;
use crate::auth::AuthUser;
use crate::error::{internal, ApiError};
use crate::models::{
    CreateQuotationRequest, EstimateRequest, ListFilterQuery, NewQuotation, Quotation,
    RecordFilter, RequestStatus,
};
use crate::validation;
use crate::AppState;

/// GET /v1/admin/services/:service_id/quotations?status=&phone=
async fn list_quotations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(service_id): Path<String>,
    Query(query): Query<ListFilterQuery>,
) -> Result<Json<Vec<Quotation>>, ApiError> {
    let filter = RecordFilter::try_from(query).map_err(ApiError::Validation)?;
    let quotations = state
        .firestore
        .list_quotations(&service_id)
        .await
        .map_err(internal("Failed to list quotations"))?;

    let quotations = filter.apply(quotations);
    tracing::info!(
        "Admin {} listed {} quotations of service {}",
        user.uid,
        quotations.len(),
        service_id
    );
    Ok(Json(quotations))
}

fn new_quotation(request: &CreateQuotationRequest) -> Result<(String, NewQuotation), ApiError> {
    let service_id = validation::require("service_id", request.service_id.as_deref())?;
    let (client_name, email, phone) = validation::contact(
        request.client_name.as_deref(),
        request.email.as_deref(),
        request.phone.as_deref(),
    )?;
    let address = validation::require("address", request.address.as_deref())?;
    let requested_on = validation::require("requested_on", request.requested_on.as_deref())?;
    let description = validation::require("description", request.description.as_deref())?;

    Ok((
        service_id,
        NewQuotation {
            client_name,
            email,
            address: Some(address),
            phone,
            description,
            requested_on: Some(validation::parse_date("requested_on", &requested_on)?),
            estimated_cost: Some(validation::parse_estimated_cost(request.estimated_cost.as_ref())?),
        },
    ))
}

/// POST /v1/admin/quotations
async fn create_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<Quotation>), ApiError> {
    let (service_id, quotation) = new_quotation(&request)?;
    let service = require_service(&state, &service_id).await?;

    let created = state
        .firestore
        .create_quotation(&service_id, &service.name, &quotation)
        .await
        .map_err(internal("Failed to create quotation"))?;

    tracing::info!("Admin {} added quotation {}", user.uid, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /v1/admin/services/:service_id/quotations/:quotation_id/estimate
async fn set_estimate(
    State(state): State<AppState>,
    user: AuthUser,
    Path((service_id, quotation_id)): Path<(String, String)>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<Quotation>, ApiError> {
    let cost = validation::parse_estimated_cost(request.estimated_cost.as_ref())?;
    tracing::info!("Admin {} estimating quotation {} at {}", user.uid, quotation_id, cost);

    state
        .firestore
        .set_quotation_estimate(&service_id, &quotation_id, cost)
        .await
        .map_err(internal("Failed to save estimate"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Quotation not found".to_string()))
}

/// POST /v1/admin/services/:service_id/quotations/:quotation_id/cancel
async fn cancel_quotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path((service_id, quotation_id)): Path<(String, String)>,
) -> Result<Json<Quotation>, ApiError> {
    let quotation = state
        .firestore
        .get_quotation(&service_id, &quotation_id)
        .await
        .map_err(internal("Failed to load quotation"))?
        .ok_or_else(|| ApiError::NotFound("Quotation not found".to_string()))?;
    if quotation.status == RequestStatus::Cancelled {
        return Ok(Json(quotation));
    }

    tracing::info!("Admin {} cancelling quotation {}", user.uid, quotation_id);
    state
        .firestore
        .set_quotation_status(&service_id, &quotation_id, RequestStatus::Cancelled)
        .await
        .map_err(internal("Failed to cancel quotation"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Quotation not found".to_string()))
}

pub fn quotations_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/quotations", post(create_quotation))
        .route(
            "/v1/admin/services/:service_id/quotations",
            get(list_quotations),
        )
        .route(
            "/v1/admin/services/:service_id/quotations/:quotation_id/estimate",
            put(set_estimate),
        )
        .route(
            "/v1/admin/services/:service_id/quotations/:quotation_id/cancel",
            post(cancel_quotation),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::CostInput;
    use chrono::NaiveDate;

    fn request() -> CreateQuotationRequest {
        CreateQuotationRequest {
            service_id: Some("svc".to_string()),
            client_name: Some("Luis".to_string()),
            email: Some("luis@example.com".to_string()),
            address: Some("Av. Reforma 10".to_string()),
            requested_on: Some("2025-04-20".to_string()),
            description: Some("Impermeabilizar azotea".to_string()),
            phone: Some("5587654321".to_string()),
            estimated_cost: Some(CostInput::Text("4500".to_string())),
        }
    }

    #[test]
    fn test_admin_quotation_form() {
        let (service_id, quotation) = new_quotation(&request()).unwrap();
        assert_eq!(service_id, "svc");
        assert_eq!(quotation.requested_on, NaiveDate::from_ymd_opt(2025, 4, 20));
        assert_eq!(quotation.estimated_cost, Some(4500.0));
        assert_eq!(quotation.address.as_deref(), Some("Av. Reforma 10"));
    }

    #[test]
    fn test_admin_quotation_needs_numeric_cost() {
        let no_cost = CreateQuotationRequest {
            estimated_cost: None,
            ..request()
        };
        assert!(new_quotation(&no_cost).is_err());

        let text_cost = CreateQuotationRequest {
            estimated_cost: Some(CostInput::Text("a convenir".to_string())),
            ..request()
        };
        assert_eq!(
            new_quotation(&text_cost).unwrap_err().to_string(),
            "estimated_cost must be a valid number"
        );
    }
}

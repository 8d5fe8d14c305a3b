// Admin dashboard
// Endpoint: GET /v1/admin/dashboard

use axum::{extract::State, routing::get, Json, Router};
use futures::future::try_join_all;

use crate::auth::AuthUser;
use crate::error::{internal, ApiError};
use crate::models::{DashboardSummary, RequestStatus};
use crate::AppState;

/// GET /v1/admin/dashboard - pending counts and recent activity across all services
async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardSummary>, ApiError> {
    let services = state
        .firestore
        .list_service_headers()
        .await
        .map_err(internal("Failed to list services"))?;

    let firestore = &state.firestore;
    let per_service = try_join_all(services.iter().map(|service| async move {
        futures::try_join!(
            firestore.appointments_with_status(&service.id, RequestStatus::Pending),
            firestore.quotations_with_status(&service.id, RequestStatus::Pending),
        )
    }))
    .await
    .map_err(internal("Failed to load pending requests"))?;

    let (appointments, quotations): (Vec<_>, Vec<_>) = per_service.into_iter().unzip();
    let appointments: Vec<_> = appointments.into_iter().flatten().collect();
    let quotations: Vec<_> = quotations.into_iter().flatten().collect();

    let summary = DashboardSummary::from_pending(&appointments, &quotations);
    tracing::info!(
        "Dashboard for {}: {} services, {} pending appointments, {} pending quotations",
        user.uid,
        services.len(),
        summary.pending_appointments,
        summary.pending_quotations
    );
    Ok(Json(summary))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/v1/admin/dashboard", get(get_dashboard))
}

// Susticorp Backend - Rust
// Public catalog and booking API plus the admin panel backend

use axum::Router;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use std::fs::OpenOptions;
use std::io::LineWriter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Custom time formatter: [HH:mm:ss] [backend]
#[derive(Clone)]
struct BackendTimer;

impl FormatTime for BackendTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "[{}] [backend]", now.format("%H:%M:%S"))
    }
}

mod auth;
mod config;
mod error;
mod models;
mod routes;
mod scheduling;
mod services;
mod validation;

use auth::{firebase_auth_extension, FirebaseAuth};
use config::Config;
use routes::{
    admin_services_routes, appointments_routes, auth_routes, dashboard_routes, health_routes,
    quotations_routes, requests_routes, services_routes,
};
use services::{CloudinaryService, FirestoreService, IdentityToolkit};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub firestore: Arc<FirestoreService>,
    pub cloudinary: Arc<CloudinaryService>,
    pub identity: Arc<IdentityToolkit>,
    /// Zone appointments are booked in
    pub timezone: Tz,
}

impl AppState {
    /// Current wall-clock time at the business
    pub fn local_now(&self) -> NaiveDateTime {
        chrono::Utc::now().with_timezone(&self.timezone).naive_local()
    }
}

/// Stdout logging, plus a file copy when LOG_FILE is set.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(log_file: Option<&str>) -> Option<WorkerGuard> {
    let (file_writer, guard) = match log_file.map(|path| OpenOptions::new().create(true).append(true).open(path)) {
        // LineWriter flushes after each line so the file is readable live
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(LineWriter::new(file));
            (Some(writer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Failed to open log file: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    // Format: [HH:mm:ss] [backend] message
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "susticorp_backend=info,tower_http=info".into()),
        )
        // Stdout layer
        .with(
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_level(false)
                .with_ansi(true),
        )
        // File layer (same format, no ANSI colors)
        .with(file_writer.map(|writer| {
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_level(false)
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    guard
}

/// Every route, with the auth verifier and HTTP layers applied
fn build_router(state: AppState, firebase_auth: Arc<FirebaseAuth>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Public site
        .merge(health_routes())
        .merge(services_routes())
        .merge(requests_routes())
        .merge(auth_routes())
        // Admin panel
        .merge(dashboard_routes())
        .merge(admin_services_routes())
        .merge(appointments_routes())
        .merge(quotations_routes())
        .with_state(state)
        .layer(firebase_auth_extension(firebase_auth))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let _log_guard = init_tracing(config.log_file.as_deref());

    // Missing settings only warn; a bad time zone would break every booking
    config.validate()?;
    let timezone = config.timezone()?;
    let project_id = config.project_id();

    // Initialize Firebase Auth
    let firebase_auth = Arc::new(FirebaseAuth::new(project_id.clone()));
    if let Err(e) = firebase_auth.refresh_keys().await {
        tracing::warn!("Failed to fetch Firebase keys: {} - admin auth will retry on demand", e);
    }

    // Initialize Firestore
    let firestore = Arc::new(FirestoreService::new(project_id)?);
    firestore.warm_up().await;

    let state = AppState {
        firestore,
        cloudinary: Arc::new(CloudinaryService::new(&config)),
        identity: Arc::new(IdentityToolkit::new(config.firebase_api_key.clone())),
        timezone,
    };

    let app = build_router(state, firebase_auth);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting Susticorp backend on {} ({})", addr, timezone);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = Config::default();
        let state = AppState {
            firestore: Arc::new(FirestoreService::new("susticorp-test".to_string()).unwrap()),
            cloudinary: Arc::new(CloudinaryService::new(&config)),
            identity: Arc::new(IdentityToolkit::new(None)),
            timezone: config.timezone().unwrap(),
        };
        build_router(state, Arc::new(FirebaseAuth::new("susticorp-test".to_string())))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = test_app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_admin_routes_require_a_bearer_token() {
        let (status, body) =
            send(Request::get("/v1/admin/dashboard").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");

        let (status, _) = send(post_json(
            "/v1/admin/services/svc/appointments/abc/attend",
            json!({}),
        ))
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_request_is_validated_before_lookup() {
        let (status, body) = send(post_json(
            "/v1/services/svc/requests",
            json!({
                "kind": "cita",
                "client_name": "Ana",
                "email": "not-an-email",
                "phone": "5512345678",
                "address": "Calle 1",
                "date": "2030-01-15",
                "time": "10:00"
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn test_available_hours_needs_a_date() {
        let (status, body) = send(
            Request::get("/v1/services/svc/available-hours")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "date is required");
    }

    #[tokio::test]
    async fn test_sign_in_without_api_key_is_an_upstream_error() {
        let (status, _) = send(post_json(
            "/v1/auth/sign-in",
            json!({"email": "admin@example.com", "password": "secret1"}),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}

// Admin account routes
// Endpoints: POST /v1/auth/sign-in (public), POST /v1/admin/users

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::services::{AuthSession, IdentityError};
use crate::validation;
use crate::AppState;

/// Identity Toolkit rejects anything shorter
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        let message = e.message().to_string();
        match e {
            IdentityError::WrongPassword
            | IdentityError::UserNotFound
            | IdentityError::InvalidCredentials
            | IdentityError::TooManyAttempts => ApiError::Credentials(message),
            IdentityError::EmailExists => ApiError::Conflict(message),
            IdentityError::WeakPassword => ApiError::Validation(message),
            IdentityError::NotConfigured | IdentityError::Unexpected(_) => ApiError::Upstream(message),
        }
    }
}

fn credentials(request: &CredentialsRequest) -> Result<(String, String), ApiError> {
    let email = validation::require("email", request.email.as_deref())?;
    validation::validate_email(&email)?;
    // Passwords are not trimmed
    let password = request
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("password is required"))?;
    Ok((email, password))
}

/// POST /v1/auth/sign-in
async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let (email, password) = credentials(&request)?;
    let session = state.identity.sign_in(&email, &password).await?;
    tracing::info!("Admin {} signed in", session.uid);
    Ok(Json(session))
}

/// POST /v1/admin/users - only an existing admin can add another
async fn create_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthSession>), ApiError> {
    let (email, password) = credentials(&request)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let session = state.identity.sign_up(&email, &password).await?;
    tracing::info!("Admin {} created admin account {}", user.uid, session.uid);
    Ok((StatusCode::CREATED, Json(session)))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/sign-in", post(sign_in))
        .route("/v1/admin/users", post(create_admin))
}

// Firebase Identity Toolkit - email/password sign-in for the admin panel

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Tokens returned after a successful sign-in or sign-up
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds until `id_token` expires
    pub expires_in: u64,
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorResponse {
    error: IdentityErrorBody,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorBody {
    message: String,
}

/// Why the provider refused a sign-in or sign-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    WrongPassword,
    UserNotFound,
    InvalidCredentials,
    EmailExists,
    WeakPassword,
    TooManyAttempts,
    NotConfigured,
    Unexpected(String),
}

impl IdentityError {
    /// Map an Identity Toolkit error code. Codes may carry a suffix,
    /// e.g. "WEAK_PASSWORD : Password should be at least 6 characters".
    pub fn from_code(code: &str) -> Self {
        let code = code.split(':').next().unwrap_or("").trim();
        match code {
            "INVALID_PASSWORD" => IdentityError::WrongPassword,
            "EMAIL_NOT_FOUND" => IdentityError::UserNotFound,
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" | "MISSING_PASSWORD" => {
                IdentityError::InvalidCredentials
            }
            "EMAIL_EXISTS" => IdentityError::EmailExists,
            "WEAK_PASSWORD" => IdentityError::WeakPassword,
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "USER_DISABLED" => IdentityError::TooManyAttempts,
            other => IdentityError::Unexpected(other.to_string()),
        }
    }

    /// Message shown to the person signing in
    pub fn message(&self) -> &'static str {
        match self {
            IdentityError::WrongPassword => "The password is incorrect.",
            IdentityError::UserNotFound => "The user does not exist.",
            IdentityError::InvalidCredentials => "The credentials are invalid.",
            IdentityError::EmailExists => "An account with that email already exists.",
            IdentityError::WeakPassword => "The password is too weak.",
            IdentityError::TooManyAttempts => "Access temporarily blocked. Try again later.",
            IdentityError::NotConfigured | IdentityError::Unexpected(_) => {
                "An unexpected error occurred. Please try again."
            }
        }
    }
}

pub struct IdentityToolkit {
    client: Client,
    api_key: Option<String>,
}

impl IdentityToolkit {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        self.call("accounts:signInWithPassword", email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        self.call("accounts:signUp", email, password).await
    }

    async fn call(&self, method: &str, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let api_key = self.api_key.as_deref().ok_or(IdentityError::NotConfigured)?;
        let url = format!("{}/{}?key={}", IDENTITY_TOOLKIT_URL, method, urlencoding::encode(api_key));

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Identity Toolkit request failed: {}", e);
                IdentityError::Unexpected(e.to_string())
            })?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<IdentityErrorResponse>(&body)
                .map(|e| IdentityError::from_code(&e.error.message))
                .unwrap_or_else(|_| IdentityError::Unexpected(body));
            tracing::warn!("Identity Toolkit {} rejected {}: {:?}", method, email, error);
            return Err(error);
        }

        let body: IdentityResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Identity Toolkit response: {}", e);
            IdentityError::Unexpected(e.to_string())
        })?;

        Ok(AuthSession {
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in.parse().unwrap_or(3600),
            uid: body.local_id,
            email: if body.email.is_empty() { email.to_string() } else { body.email },
        })
    }
}

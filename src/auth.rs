// Firebase Authentication - verifies admin ID tokens
// Every /v1/admin route takes an AuthUser, so unauthenticated calls never
// reach a handler body.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Extension,
};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ApiError, ServiceError};

/// Google's published signing keys for Firebase ID tokens
const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Minimum seconds between key refreshes triggered by unknown key IDs
const KEY_REFRESH_COOLDOWN_SECS: i64 = 60;

/// Authenticated administrator
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    refreshed_at: Option<i64>,
}

pub struct FirebaseAuth {
    project_id: String,
    client: Client,
    cache: RwLock<KeyCache>,
}

impl FirebaseAuth {
    pub fn new(project_id: String) -> Self {
        Self {
            project_id,
            client: Client::new(),
            cache: RwLock::new(KeyCache::default()),
        }
    }

    /// Download the current signing keys
    pub async fn refresh_keys(&self) -> Result<(), ServiceError> {
        let response = self.client.get(FIREBASE_JWKS_URL).send().await?;
        if !response.status().is_success() {
            return Err(format!("Failed to fetch Firebase keys: {}", response.status()).into());
        }

        let jwks: JwkSet = response.json().await?;
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => tracing::warn!("Skipping Firebase key {}: {}", kid, e),
            }
        }

        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.refreshed_at = Some(chrono::Utc::now().timestamp());
        tracing::info!("Loaded {} Firebase signing keys", cache.keys.len());
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> Option<DecodingKey> {
        if let Some(key) = self.cache.read().await.keys.get(kid) {
            return Some(key.clone());
        }

        // Google rotates keys; an unknown kid usually means ours are stale
        let recently_refreshed = self
            .cache
            .read()
            .await
            .refreshed_at
            .map_or(false, |t| chrono::Utc::now().timestamp() - t < KEY_REFRESH_COOLDOWN_SECS);
        if recently_refreshed {
            return None;
        }
        if let Err(e) = self.refresh_keys().await {
            tracing::warn!("Failed to refresh Firebase keys: {}", e);
            return None;
        }
        self.cache.read().await.keys.get(kid).cloned()
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation
    }

    /// Verify a Firebase ID token and return the signed-in user
    pub async fn verify_token(&self, token: &str) -> Result<AuthUser, String> {
        let header = decode_header(token).map_err(|e| format!("Malformed token: {}", e))?;
        if header.alg != Algorithm::RS256 {
            return Err(format!("Unexpected token algorithm: {:?}", header.alg));
        }
        let kid = header.kid.ok_or("Token has no key ID")?;
        let key = self
            .key_for(&kid)
            .await
            .ok_or_else(|| format!("Unknown signing key: {}", kid))?;

        let data = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| format!("Invalid token: {}", e))?;

        if data.claims.sub.is_empty() {
            return Err("Token has an empty subject".to_string());
        }

        Ok(AuthUser {
            uid: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Layer that makes the verifier available to the AuthUser extractor
pub fn firebase_auth_extension(auth: Arc<FirebaseAuth>) -> Extension<Arc<FirebaseAuth>> {
    Extension(auth)
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;

        let auth = parts
            .extensions
            .get::<Arc<FirebaseAuth>>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("FirebaseAuth extension missing from router");
                ApiError::Unauthorized
            })?;

        auth.verify_token(token).await.map_err(|e| {
            tracing::warn!("Rejected admin token: {}", e);
            ApiError::Unauthorized
        })
    }
}

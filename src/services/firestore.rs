// Firestore service - servicios and their citas / cotizaciones / imagenes
// Uses Firestore REST API for simplicity and compatibility

use chrono::{DateTime, NaiveDate, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ServiceError;
use crate::models::{
    Appointment, NewAppointment, NewQuotation, Quotation, RequestStatus, Service, ServiceFields,
    ServiceImage,
};

/// Service account credentials from JSON file
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

/// JWT claims for Google OAuth2
#[derive(Debug, Serialize)]
struct GoogleJwtClaims {
    iss: String,      // Service account email
    scope: String,    // OAuth scopes
    aud: String,      // Token endpoint
    iat: i64,         // Issued at
    exp: i64,         // Expiration
}

/// Cached access token with expiration
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Firestore collection paths, shared with the legacy web client
pub const SERVICES_COLLECTION: &str = "servicios";
pub const APPOINTMENTS_SUBCOLLECTION: &str = "citas";
pub const QUOTATIONS_SUBCOLLECTION: &str = "cotizaciones";
pub const IMAGES_SUBCOLLECTION: &str = "imagenes";

/// Documents per page when listing a collection
const PAGE_SIZE: usize = 300;

/// Generate a document ID from a seed string using SHA256 hash
pub fn document_id_from_seed(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..10]) // First 20 hex chars (10 bytes)
}

/// Firestore REST API client
pub struct FirestoreService {
    client: Client,
    project_id: String,
    credentials: Option<ServiceAccountCredentials>,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl FirestoreService {
    /// Create a new Firestore service. No network traffic until the first
    /// request (or `warm_up`).
    pub fn new(project_id: String) -> Result<Self, ServiceError> {
        let credentials = Self::load_credentials()?;

        Ok(Self {
            client: Client::new(),
            project_id,
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Pre-fetch an access token so the first request is not slowed down
    pub async fn warm_up(&self) {
        if let Err(e) = self.get_access_token().await {
            tracing::warn!("Failed to get initial access token: {}", e);
        }
    }

    /// Load service account credentials from JSON file
    fn load_credentials() -> Result<Option<ServiceAccountCredentials>, ServiceError> {
        // Check GOOGLE_APPLICATION_CREDENTIALS environment variable
        let creds_path = match std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            Ok(path) => path,
            Err(_) => {
                // Try default location in current directory
                if std::path::Path::new("google-credentials.json").exists() {
                    "google-credentials.json".to_string()
                } else {
                    tracing::warn!("No GOOGLE_APPLICATION_CREDENTIALS set and no google-credentials.json found");
                    return Ok(None);
                }
            }
        };

        tracing::info!("Loading service account credentials from: {}", creds_path);

        let creds_json = std::fs::read_to_string(&creds_path)
            .map_err(|e| format!("Failed to read credentials file {}: {}", creds_path, e))?;

        let credentials: ServiceAccountCredentials = serde_json::from_str(&creds_json)
            .map_err(|e| format!("Failed to parse credentials JSON: {}", e))?;

        tracing::info!("Loaded credentials for service account: {}", credentials.client_email);

        Ok(Some(credentials))
    }

    /// Get access token, using cache if valid or refreshing if needed
    async fn get_access_token(&self) -> Result<String, ServiceError> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Utc::now().timestamp();
                // Use token if it has at least 60 seconds left
                if cached.expires_at > now + 60 {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.fetch_new_access_token().await?;

        // Tokens are valid for 1 hour, refresh after 55 minutes
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at: Utc::now().timestamp() + 3300,
            });
        }

        Ok(token)
    }

    /// Fetch a new access token from Google OAuth
    async fn fetch_new_access_token(&self) -> Result<String, ServiceError> {
        if let Some(creds) = &self.credentials {
            let token = self.get_token_from_service_account(creds).await?;
            tracing::info!("Got access token from service account");
            return Ok(token);
        }

        // Fall back to metadata server (Cloud Run without credentials file)
        if let Ok(token) = self.try_metadata_server().await {
            tracing::info!("Got access token from GCP metadata server");
            return Ok(token);
        }

        Err("No valid authentication method available. Set GOOGLE_APPLICATION_CREDENTIALS or run on GCP.".into())
    }

    /// Try to get token from GCP metadata server
    async fn try_metadata_server(&self) -> Result<String, ServiceError> {
        let metadata_url =
            "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

        let response = self.client
            .get(metadata_url)
            .header("Metadata-Flavor", "Google")
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await?;

        if response.status().is_success() {
            #[derive(Deserialize)]
            struct TokenResponse {
                access_token: String,
            }
            let token: TokenResponse = response.json().await?;
            return Ok(token.access_token);
        }

        Err("Metadata server not available".into())
    }

    /// Get access token using service account credentials (OAuth2 JWT flow)
    async fn get_token_from_service_account(
        &self,
        creds: &ServiceAccountCredentials,
    ) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let token_uri = creds.token_uri.as_deref().unwrap_or("https://oauth2.googleapis.com/token");

        let claims = GoogleJwtClaims {
            iss: creds.client_email.clone(),
            scope: "https://www.googleapis.com/auth/datastore".to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        // Sign JWT with service account private key (RS256)
        let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())
            .map_err(|e| format!("Failed to parse private key: {}", e))?;

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| format!("Failed to encode JWT: {}", e))?;

        let response = self.client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| format!("Token request failed: {}", e))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Token exchange failed: {}", error_text).into());
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let token_response: TokenResponse = response.json().await
            .map_err(|e| format!("Failed to parse token response: {}", e))?;

        Ok(token_response.access_token)
    }

    /// Build Firestore REST API base URL
    fn base_url(&self) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
            self.project_id
        )
    }

    /// servicios/{service_id}
    fn service_url(&self, service_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url(),
            SERVICES_COLLECTION,
            urlencoding::encode(service_id)
        )
    }

    /// servicios/{service_id}/{subcollection}[/{doc_id}]
    fn child_url(&self, service_id: &str, subcollection: &str, doc_id: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.service_url(service_id), subcollection);
        if let Some(id) = doc_id {
            url.push('/');
            url.push_str(&urlencoding::encode(id));
        }
        url
    }

    /// Build request with auth header
    async fn build_request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, ServiceError> {
        let token = self.get_access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    // =========================================================================
    // DOCUMENT PRIMITIVES
    // =========================================================================

    /// Fetch one document, `None` on 404
    async fn get_document(&self, url: &str) -> Result<Option<Value>, ServiceError> {
        let response = self
            .build_request(reqwest::Method::GET, url)
            .await?
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Firestore get error: {}", error_text).into());
        }

        Ok(Some(response.json().await?))
    }

    /// List every document of a collection, following page tokens
    async fn list_documents(&self, collection_url: &str) -> Result<Vec<Value>, ServiceError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}?pageSize={}", collection_url, PAGE_SIZE);
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&urlencoding::encode(token));
            }

            let response = self
                .build_request(reqwest::Method::GET, &url)
                .await?
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                tracing::error!("Firestore list error: {}", error_text);
                return Err(format!("Firestore list failed: {}", error_text).into());
            }

            let mut page: Value = response.json().await?;
            if let Some(Value::Array(docs)) = page.get_mut("documents").map(Value::take) {
                documents.extend(docs);
            }

            page_token = page
                .get("nextPageToken")
                .and_then(|t| t.as_str())
                .map(|t| t.to_string());
            if page_token.is_none() {
                break;
            }
        }

        Ok(documents)
    }

    /// Equality query on one string field of a service subcollection
    async fn query_subcollection(
        &self,
        service_id: &str,
        subcollection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        let query = json!({
            "structuredQuery": {
                "from": [{"collectionId": subcollection}],
                "where": {
                    "fieldFilter": {
                        "field": {"fieldPath": field},
                        "op": "EQUAL",
                        "value": {"stringValue": value}
                    }
                }
            }
        });

        tracing::debug!("Firestore query: {}", serde_json::to_string_pretty(&query).unwrap_or_default());

        let response = self
            .build_request(reqwest::Method::POST, &format!("{}:runQuery", self.service_url(service_id)))
            .await?
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            tracing::error!("Firestore query error: {}", error_text);
            return Err(format!("Firestore query failed: {}", error_text).into());
        }

        // runQuery returns one entry per result; an empty result set still
        // carries a single entry without "document"
        let results: Vec<Value> = response.json().await?;
        Ok(results
            .into_iter()
            .filter_map(|mut r| r.get_mut("document").map(Value::take))
            .collect())
    }

    /// Create or overwrite a document and return what was stored
    async fn write_document(&self, url: &str, fields: Value) -> Result<Value, ServiceError> {
        let response = self
            .build_request(reqwest::Method::PATCH, url)
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Firestore write error: {}", error_text).into());
        }

        Ok(response.json().await?)
    }

    /// Partial update of an existing document. The `currentDocument.exists`
    /// precondition keeps a PATCH from creating a stray document; a missing
    /// target comes back as `Ok(None)`.
    async fn update_fields(
        &self,
        url: &str,
        fields: Value,
        update_mask: &[&str],
    ) -> Result<Option<Value>, ServiceError> {
        let mask_params = update_mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", f))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{}?{}&currentDocument.exists=true", url, mask_params);

        let response = self
            .build_request(reqwest::Method::PATCH, &url)
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Firestore update error: {}", error_text).into());
        }

        Ok(Some(response.json().await?))
    }

    async fn delete_document(&self, url: &str) -> Result<(), ServiceError> {
        let response = self
            .build_request(reqwest::Method::DELETE, url)
            .await?
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let error_text = response.text().await?;
            return Err(format!("Firestore delete error: {}", error_text).into());
        }

        Ok(())
    }

    // =========================================================================
    // SERVICES
    // =========================================================================

    /// All services with their images, newest first
    pub async fn list_services(&self) -> Result<Vec<Service>, ServiceError> {
        let docs = self
            .list_documents(&format!("{}/{}", self.base_url(), SERVICES_COLLECTION))
            .await?;

        let mut services: Vec<Service> = docs
            .iter()
            .filter_map(|d| match parse_service(d) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("Failed to parse service: {}", e);
                    None
                }
            })
            .collect();

        let image_lists = futures::future::join_all(
            services.iter().map(|s| self.list_service_images(&s.id)),
        )
        .await;

        for (service, images) in services.iter_mut().zip(image_lists) {
            match images {
                Ok(images) => service.images = images,
                Err(e) => tracing::warn!("Failed to load images for service {}: {}", service.id, e),
            }
        }

        Service::sort_newest_first(&mut services);
        tracing::info!("Retrieved {} services", services.len());
        Ok(services)
    }

    /// Service names only, for the admin dropdowns and the dashboard
    pub async fn list_service_headers(&self) -> Result<Vec<Service>, ServiceError> {
        let docs = self
            .list_documents(&format!("{}/{}", self.base_url(), SERVICES_COLLECTION))
            .await?;
        let mut services = parse_all(&docs, parse_service, "service");
        Service::sort_newest_first(&mut services);
        Ok(services)
    }

    /// One service with its images
    pub async fn get_service(&self, service_id: &str) -> Result<Option<Service>, ServiceError> {
        let Some(doc) = self.get_document(&self.service_url(service_id)).await? else {
            return Ok(None);
        };
        let mut service = parse_service(&doc)?;
        service.images = self.list_service_images(service_id).await?;
        Ok(Some(service))
    }

    /// Service document without its images
    pub async fn get_service_header(&self, service_id: &str) -> Result<Option<Service>, ServiceError> {
        match self.get_document(&self.service_url(service_id)).await? {
            Some(doc) => Ok(Some(parse_service(&doc)?)),
            None => Ok(None),
        }
    }

    /// Create a service document (images are attached separately)
    pub async fn create_service(&self, fields: &ServiceFields) -> Result<Service, ServiceError> {
        let service_id = uuid::Uuid::new_v4().to_string();
        let mut doc_fields = service_to_firestore(fields);
        doc_fields["creadoEn"] = json!({"timestampValue": Utc::now().to_rfc3339()});

        let created = self.write_document(&self.service_url(&service_id), doc_fields).await?;
        let service = parse_service(&created)?;

        tracing::info!("Created service {} ({})", service.id, service.name);
        Ok(service)
    }

    /// Replace name, description and price range
    pub async fn update_service(
        &self,
        service_id: &str,
        fields: &ServiceFields,
    ) -> Result<Option<Service>, ServiceError> {
        let updated = self
            .update_fields(
                &self.service_url(service_id),
                service_to_firestore(fields),
                &["nombre", "descripcion", "rangoPrecios"],
            )
            .await?;

        match updated {
            Some(doc) => {
                tracing::info!("Updated service {}", service_id);
                Ok(Some(parse_service(&doc)?))
            }
            None => Ok(None),
        }
    }

    pub async fn list_service_images(&self, service_id: &str) -> Result<Vec<ServiceImage>, ServiceError> {
        let docs = self
            .list_documents(&self.child_url(service_id, IMAGES_SUBCOLLECTION, None))
            .await?;
        Ok(docs.iter().filter_map(parse_image).collect())
    }

    /// Attach an uploaded image URL; the document ID is derived from the URL
    pub async fn add_service_image(&self, service_id: &str, url: &str) -> Result<ServiceImage, ServiceError> {
        let image_id = document_id_from_seed(url);
        let doc = self
            .write_document(
                &self.child_url(service_id, IMAGES_SUBCOLLECTION, Some(&image_id)),
                json!({ "url": {"stringValue": url} }),
            )
            .await?;
        parse_image(&doc).ok_or_else(|| "Stored image document has no url".into())
    }

    pub async fn delete_service_image(&self, service_id: &str, image_id: &str) -> Result<(), ServiceError> {
        self.delete_document(&self.child_url(service_id, IMAGES_SUBCOLLECTION, Some(image_id)))
            .await?;
        tracing::info!("Deleted image {} of service {}", image_id, service_id);
        Ok(())
    }

    /// Remove every image record pointing at `url` (older records have random IDs)
    pub async fn delete_service_image_by_url(&self, service_id: &str, url: &str) -> Result<usize, ServiceError> {
        let matching: Vec<ServiceImage> = self
            .list_service_images(service_id)
            .await?
            .into_iter()
            .filter(|img| img.url == url)
            .collect();

        for image in &matching {
            self.delete_service_image(service_id, &image.id).await?;
        }
        Ok(matching.len())
    }

    // =========================================================================
    // APPOINTMENTS (CITAS)
    // =========================================================================

    pub async fn list_appointments(&self, service_id: &str) -> Result<Vec<Appointment>, ServiceError> {
        let docs = self
            .list_documents(&self.child_url(service_id, APPOINTMENTS_SUBCOLLECTION, None))
            .await?;
        let mut items = parse_all(&docs, |d| parse_appointment(d, service_id), "appointment");
        Appointment::sort_chronologically(&mut items);
        Ok(items)
    }

    pub async fn get_appointment(
        &self,
        service_id: &str,
        appointment_id: &str,
    ) -> Result<Option<Appointment>, ServiceError> {
        let url = self.child_url(service_id, APPOINTMENTS_SUBCOLLECTION, Some(appointment_id));
        match self.get_document(&url).await? {
            Some(doc) => Ok(Some(parse_appointment(&doc, service_id)?)),
            None => Ok(None),
        }
    }

    /// Appointments booked on one date (YYYY-MM-DD)
    pub async fn appointments_on_date(
        &self,
        service_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, ServiceError> {
        let docs = self
            .query_subcollection(
                service_id,
                APPOINTMENTS_SUBCOLLECTION,
                "fecha",
                &date.format("%Y-%m-%d").to_string(),
            )
            .await?;
        Ok(parse_all(&docs, |d| parse_appointment(d, service_id), "appointment"))
    }

    /// Appointments whose phone equals `phone`
    pub async fn appointments_by_phone(
        &self,
        service_id: &str,
        phone: &str,
    ) -> Result<Vec<Appointment>, ServiceError> {
        let docs = self
            .query_subcollection(service_id, APPOINTMENTS_SUBCOLLECTION, "telefono", phone)
            .await?;
        let mut items = parse_all(&docs, |d| parse_appointment(d, service_id), "appointment");
        Appointment::sort_chronologically(&mut items);
        Ok(items)
    }

    /// Appointments of a service in one status
    pub async fn appointments_with_status(
        &self,
        service_id: &str,
        status: RequestStatus,
    ) -> Result<Vec<Appointment>, ServiceError> {
        let docs = self
            .query_subcollection(service_id, APPOINTMENTS_SUBCOLLECTION, "estado", status.as_stored())
            .await?;
        Ok(parse_all(&docs, |d| parse_appointment(d, service_id), "appointment"))
    }

    pub async fn create_appointment(
        &self,
        service_id: &str,
        service_name: &str,
        appointment: &NewAppointment,
    ) -> Result<Appointment, ServiceError> {
        let appointment_id = uuid::Uuid::new_v4().to_string();
        let url = self.child_url(service_id, APPOINTMENTS_SUBCOLLECTION, Some(&appointment_id));

        let created = self
            .write_document(&url, appointment_to_firestore(service_name, appointment, Utc::now()))
            .await?;
        let appointment = parse_appointment(&created, service_id)?;

        tracing::info!(
            "Created appointment {} for service {} on {} {}",
            appointment.id,
            service_id,
            appointment.date,
            appointment.time
        );
        Ok(appointment)
    }

    pub async fn set_appointment_status(
        &self,
        service_id: &str,
        appointment_id: &str,
        status: RequestStatus,
    ) -> Result<Option<Appointment>, ServiceError> {
        let url = self.child_url(service_id, APPOINTMENTS_SUBCOLLECTION, Some(appointment_id));
        let updated = self
            .update_fields(&url, json!({"estado": {"stringValue": status.as_stored()}}), &["estado"])
            .await?;

        match updated {
            Some(doc) => {
                tracing::info!("Appointment {} is now {:?}", appointment_id, status);
                Ok(Some(parse_appointment(&doc, service_id)?))
            }
            None => Ok(None),
        }
    }

    pub async fn reschedule_appointment(
        &self,
        service_id: &str,
        appointment_id: &str,
        date: NaiveDate,
        time: chrono::NaiveTime,
    ) -> Result<Option<Appointment>, ServiceError> {
        let url = self.child_url(service_id, APPOINTMENTS_SUBCOLLECTION, Some(appointment_id));
        let fields = json!({
            "fecha": {"stringValue": date.format("%Y-%m-%d").to_string()},
            "hora": {"stringValue": time.format("%H:%M").to_string()}
        });

        match self.update_fields(&url, fields, &["fecha", "hora"]).await? {
            Some(doc) => {
                tracing::info!("Rescheduled appointment {} to {} {}", appointment_id, date, time);
                Ok(Some(parse_appointment(&doc, service_id)?))
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // QUOTATIONS (COTIZACIONES)
    // =========================================================================

    pub async fn list_quotations(&self, service_id: &str) -> Result<Vec<Quotation>, ServiceError> {
        let docs = self
            .list_documents(&self.child_url(service_id, QUOTATIONS_SUBCOLLECTION, None))
            .await?;
        let mut items = parse_all(&docs, |d| parse_quotation(d, service_id), "quotation");
        Quotation::sort_newest_first(&mut items);
        Ok(items)
    }

    pub async fn get_quotation(
        &self,
        service_id: &str,
        quotation_id: &str,
    ) -> Result<Option<Quotation>, ServiceError> {
        let url = self.child_url(service_id, QUOTATIONS_SUBCOLLECTION, Some(quotation_id));
        match self.get_document(&url).await? {
            Some(doc) => Ok(Some(parse_quotation(&doc, service_id)?)),
            None => Ok(None),
        }
    }

    pub async fn quotations_by_phone(
        &self,
        service_id: &str,
        phone: &str,
    ) -> Result<Vec<Quotation>, ServiceError> {
        let docs = self
            .query_subcollection(service_id, QUOTATIONS_SUBCOLLECTION, "telefono", phone)
            .await?;
        let mut items = parse_all(&docs, |d| parse_quotation(d, service_id), "quotation");
        Quotation::sort_newest_first(&mut items);
        Ok(items)
    }

    pub async fn quotations_with_status(
        &self,
        service_id: &str,
        status: RequestStatus,
    ) -> Result<Vec<Quotation>, ServiceError> {
        let docs = self
            .query_subcollection(service_id, QUOTATIONS_SUBCOLLECTION, "estado", status.as_stored())
            .await?;
        Ok(parse_all(&docs, |d| parse_quotation(d, service_id), "quotation"))
    }

    pub async fn create_quotation(
        &self,
        service_id: &str,
        service_name: &str,
        quotation: &NewQuotation,
    ) -> Result<Quotation, ServiceError> {
        let quotation_id = uuid::Uuid::new_v4().to_string();
        let url = self.child_url(service_id, QUOTATIONS_SUBCOLLECTION, Some(&quotation_id));

        let created = self
            .write_document(&url, quotation_to_firestore(service_name, quotation, Utc::now()))
            .await?;
        let quotation = parse_quotation(&created, service_id)?;

        tracing::info!("Created quotation {} for service {}", quotation.id, service_id);
        Ok(quotation)
    }

    pub async fn set_quotation_status(
        &self,
        service_id: &str,
        quotation_id: &str,
        status: RequestStatus,
    ) -> Result<Option<Quotation>, ServiceError> {
        let url = self.child_url(service_id, QUOTATIONS_SUBCOLLECTION, Some(quotation_id));
        let updated = self
            .update_fields(&url, json!({"estado": {"stringValue": status.as_stored()}}), &["estado"])
            .await?;

        match updated {
            Some(doc) => {
                tracing::info!("Quotation {} is now {:?}", quotation_id, status);
                Ok(Some(parse_quotation(&doc, service_id)?))
            }
            None => Ok(None),
        }
    }

    pub async fn set_quotation_estimate(
        &self,
        service_id: &str,
        quotation_id: &str,
        estimated_cost: f64,
    ) -> Result<Option<Quotation>, ServiceError> {
        let url = self.child_url(service_id, QUOTATIONS_SUBCOLLECTION, Some(quotation_id));
        let updated = self
            .update_fields(
                &url,
                json!({"costoEstimado": {"doubleValue": estimated_cost}}),
                &["costoEstimado"],
            )
            .await?;

        match updated {
            Some(doc) => {
                tracing::info!("Quotation {} estimated at {}", quotation_id, estimated_cost);
                Ok(Some(parse_quotation(&doc, service_id)?))
            }
            None => Ok(None),
        }
    }
}

// =============================================================================
// DOCUMENT ENCODING
// =============================================================================

fn service_to_firestore(fields: &ServiceFields) -> Value {
    json!({
        "nombre": {"stringValue": fields.name},
        "descripcion": {"stringValue": fields.description},
        "rangoPrecios": {"stringValue": fields.price_range}
    })
}

fn appointment_to_firestore(service_name: &str, a: &NewAppointment, now: DateTime<Utc>) -> Value {
    let mut fields = json!({
        "clienteNombre": {"stringValue": a.client_name},
        "fecha": {"stringValue": a.date.format("%Y-%m-%d").to_string()},
        "hora": {"stringValue": a.time.format("%H:%M").to_string()},
        "servicio": {"stringValue": service_name},
        "estado": {"stringValue": RequestStatus::Pending.as_stored()},
        "telefono": {"stringValue": a.phone},
        "correo": {"stringValue": a.email},
        "direccion": {"stringValue": a.address}
    });

    if let Some(description) = &a.description {
        fields["descripcion"] = json!({"stringValue": description});
    }
    if a.stamp_request {
        fields["fechaSolicitud"] = json!({"timestampValue": now.to_rfc3339()});
    }

    fields
}

fn quotation_to_firestore(service_name: &str, q: &NewQuotation, now: DateTime<Utc>) -> Value {
    let mut fields = json!({
        "clienteNombre": {"stringValue": q.client_name},
        "correo": {"stringValue": q.email},
        "estado": {"stringValue": RequestStatus::Pending.as_stored()},
        "servicio": {"stringValue": service_name},
        "descripcion": {"stringValue": q.description},
        "telefono": {"stringValue": q.phone}
    });

    fields["fechaSolicitud"] = match q.requested_on {
        Some(date) => json!({"stringValue": date.format("%Y-%m-%d").to_string()}),
        None => json!({"timestampValue": now.to_rfc3339()}),
    };
    if let Some(address) = &q.address {
        fields["direccion"] = json!({"stringValue": address});
    }
    if let Some(cost) = q.estimated_cost {
        fields["costoEstimado"] = json!({"doubleValue": cost});
    }

    fields
}

// =============================================================================
// DOCUMENT PARSING
// =============================================================================

/// Parse a batch of documents, skipping (and logging) the malformed ones
fn parse_all<T, F>(docs: &[Value], parse: F, what: &str) -> Vec<T>
where
    F: Fn(&Value) -> Result<T, ServiceError>,
{
    docs.iter()
        .filter_map(|d| match parse(d) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", what, e);
                None
            }
        })
        .collect()
}

fn document_id(doc: &Value) -> String {
    let name = doc.get("name").and_then(|n| n.as_str()).unwrap_or("");
    name.split('/').last().unwrap_or("").to_string()
}

fn parse_service(doc: &Value) -> Result<Service, ServiceError> {
    let fields = doc.get("fields").ok_or("Missing fields")?;

    Ok(Service {
        id: document_id(doc),
        name: parse_string(fields, "nombre").unwrap_or_default(),
        description: parse_string(fields, "descripcion").unwrap_or_default(),
        price_range: parse_string(fields, "rangoPrecios").unwrap_or_default(),
        created_at: parse_timestamp_optional(fields, "creadoEn"),
        images: vec![],
    })
}

fn parse_image(doc: &Value) -> Option<ServiceImage> {
    let url = parse_string(doc.get("fields")?, "url")?;
    if url.is_empty() {
        return None;
    }
    Some(ServiceImage {
        id: document_id(doc),
        url,
    })
}

fn parse_appointment(doc: &Value, service_id: &str) -> Result<Appointment, ServiceError> {
    let fields = doc.get("fields").ok_or("Missing fields")?;

    Ok(Appointment {
        id: document_id(doc),
        service_id: service_id.to_string(),
        client_name: parse_string(fields, "clienteNombre").unwrap_or_default(),
        date: parse_string(fields, "fecha").unwrap_or_default(),
        time: parse_string(fields, "hora").unwrap_or_default(),
        service_name: parse_string(fields, "servicio").unwrap_or_default(),
        status: parse_string(fields, "estado")
            .map(|s| RequestStatus::from_stored(&s))
            .unwrap_or_default(),
        phone: parse_phone(fields, "telefono").unwrap_or_default(),
        email: parse_string(fields, "correo").unwrap_or_default(),
        address: parse_string(fields, "direccion").unwrap_or_default(),
        description: parse_string(fields, "descripcion").filter(|d| !d.is_empty()),
        requested_at: parse_timestamp_optional(fields, "fechaSolicitud"),
    })
}

fn parse_quotation(doc: &Value, service_id: &str) -> Result<Quotation, ServiceError> {
    let fields = doc.get("fields").ok_or("Missing fields")?;

    Ok(Quotation {
        id: document_id(doc),
        service_id: service_id.to_string(),
        client_name: parse_string(fields, "clienteNombre").unwrap_or_default(),
        email: parse_string(fields, "correo").unwrap_or_default(),
        address: parse_string(fields, "direccion").filter(|a| !a.is_empty()),
        status: parse_string(fields, "estado")
            .map(|s| RequestStatus::from_stored(&s))
            .unwrap_or_default(),
        requested_on: parse_request_date(fields, "fechaSolicitud"),
        service_name: parse_string(fields, "servicio").unwrap_or_default(),
        description: parse_string(fields, "descripcion").unwrap_or_default(),
        phone: parse_phone(fields, "telefono").unwrap_or_default(),
        estimated_cost: parse_number(fields, "costoEstimado"),
    })
}

// Field parsing helpers
fn parse_string(fields: &Value, key: &str) -> Option<String> {
    fields.get(key)?.get("stringValue")?.as_str().map(|s| s.to_string())
}

/// Phones were sometimes saved as numbers by the old forms
fn parse_phone(fields: &Value, key: &str) -> Option<String> {
    parse_string(fields, key).or_else(|| {
        fields
            .get(key)?
            .get("integerValue")?
            .as_str()
            .map(|s| s.to_string())
    })
}

/// doubleValue, integerValue (a JSON string in the REST API) or numeric text
fn parse_number(fields: &Value, key: &str) -> Option<f64> {
    let value = fields.get(key)?;
    if let Some(d) = value.get("doubleValue").and_then(|v| v.as_f64()) {
        return Some(d);
    }
    if let Some(i) = value.get("integerValue").and_then(|v| v.as_str()) {
        return i.parse().ok();
    }
    value
        .get("stringValue")
        .and_then(|v| v.as_str())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn parse_timestamp_optional(fields: &Value, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(|v| v.get("timestampValue"))
        .and_then(|v| v.as_str())
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// fechaSolicitud is a timestamp (public form) or a YYYY-MM-DD string (admin form)
fn parse_request_date(fields: &Value, key: &str) -> Option<NaiveDate> {
    parse_timestamp_optional(fields, key)
        .map(|ts| ts.date_naive())
        .or_else(|| {
            parse_string(fields, key)
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    const DOC_PREFIX: &str = "projects/p/databases/(default)/documents/servicios/svc1";

    #[test]
    fn test_document_id_from_seed() {
        let id = document_id_from_seed("https://res.cloudinary.com/demo/image/upload/a.png");
        assert_eq!(id.len(), 20);
        assert_eq!(id, document_id_from_seed("https://res.cloudinary.com/demo/image/upload/a.png"));
        assert_ne!(id, document_id_from_seed("https://res.cloudinary.com/demo/image/upload/b.png"));
    }

    #[test]
    fn test_parse_service() {
        let doc = json!({
            "name": DOC_PREFIX,
            "fields": {
                "nombre": {"stringValue": "Impermeabilización"},
                "descripcion": {"stringValue": "Techos y azoteas"},
                "rangoPrecios": {"stringValue": "$1,500 - $4,000"},
                "creadoEn": {"timestampValue": "2024-11-02T18:30:00Z"}
            }
        });
        let service = parse_service(&doc).unwrap();
        assert_eq!(service.id, "svc1");
        assert_eq!(service.name, "Impermeabilización");
        assert_eq!(service.price_range, "$1,500 - $4,000");
        assert_eq!(
            service.created_at,
            Some(Utc.with_ymd_and_hms(2024, 11, 2, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_service_without_fields_fails() {
        assert!(parse_service(&json!({"name": DOC_PREFIX})).is_err());
    }

    #[test]
    fn test_parse_all_skips_broken_documents() {
        let good = json!({
            "name": DOC_PREFIX,
            "fields": {
                "nombre": {"stringValue": "Pintura"},
                "descripcion": {"stringValue": "Interiores"},
                "rangoPrecios": {"stringValue": "$900"}
            }
        });
        let broken = json!({"name": format!("{}x", DOC_PREFIX)});
        let services = parse_all(&[broken, good], parse_service, "service");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Pintura");
    }

    #[test]
    fn test_parse_image_skips_empty_url() {
        let good = json!({"name": format!("{}/imagenes/img1", DOC_PREFIX), "fields": {"url": {"stringValue": "https://x/y.png"}}});
        let empty = json!({"name": format!("{}/imagenes/img2", DOC_PREFIX), "fields": {"url": {"stringValue": ""}}});
        assert_eq!(
            parse_image(&good),
            Some(ServiceImage { id: "img1".to_string(), url: "https://x/y.png".to_string() })
        );
        assert_eq!(parse_image(&empty), None);
    }

    #[test]
    fn test_parse_legacy_appointment() {
        let doc = json!({
            "name": format!("{}/citas/c1", DOC_PREFIX),
            "fields": {
                "clienteNombre": {"stringValue": "Ana López"},
                "fecha": {"stringValue": "2025-02-14"},
                "hora": {"stringValue": "10:30"},
                "servicio": {"stringValue": "Pintura"},
                "estado": {"stringValue": "Cancelado"},
                "telefono": {"integerValue": "5512345678"},
                "correo": {"stringValue": "ana@example.com"},
                "direccion": {"stringValue": "Av. Juárez 10"},
                "descripcion": {"stringValue": ""}
            }
        });
        let a = parse_appointment(&doc, "svc1").unwrap();
        assert_eq!(a.id, "c1");
        assert_eq!(a.service_id, "svc1");
        assert_eq!(a.status, RequestStatus::Cancelled);
        assert_eq!(a.phone, "5512345678");
        assert_eq!(a.slot(), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(a.description, None);
        assert_eq!(a.requested_at, None);
    }

    #[test]
    fn test_parse_quotation_cost_and_date_variants() {
        let admin_doc = json!({
            "name": format!("{}/cotizaciones/q1", DOC_PREFIX),
            "fields": {
                "clienteNombre": {"stringValue": "Luis"},
                "fechaSolicitud": {"stringValue": "2025-01-20"},
                "costoEstimado": {"stringValue": "3200"},
                "estado": {"stringValue": "Pendiente"}
            }
        });
        let q = parse_quotation(&admin_doc, "svc1").unwrap();
        assert_eq!(q.requested_on, NaiveDate::from_ymd_opt(2025, 1, 20));
        assert_eq!(q.estimated_cost, Some(3200.0));
        assert_eq!(q.status, RequestStatus::Pending);

        let public_doc = json!({
            "name": format!("{}/cotizaciones/q2", DOC_PREFIX),
            "fields": {
                "fechaSolicitud": {"timestampValue": "2025-01-21T23:59:00Z"},
                "costoEstimado": {"integerValue": "1500"}
            }
        });
        let q = parse_quotation(&public_doc, "svc1").unwrap();
        assert_eq!(q.requested_on, NaiveDate::from_ymd_opt(2025, 1, 21));
        assert_eq!(q.estimated_cost, Some(1500.0));

        let bad_cost = json!({"name": "x/q3", "fields": {"costoEstimado": {"stringValue": "por definir"}}});
        assert_eq!(parse_quotation(&bad_cost, "svc1").unwrap().estimated_cost, None);
    }

    #[test]
    fn test_appointment_encoding() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();
        let mut new = NewAppointment {
            client_name: "Ana".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            phone: "5512345678".to_string(),
            email: "ana@example.com".to_string(),
            address: "Calle 5".to_string(),
            description: None,
            stamp_request: false,
        };
        let fields = appointment_to_firestore("Pintura", &new, now);
        assert_eq!(fields["fecha"]["stringValue"], "2025-03-04");
        assert_eq!(fields["hora"]["stringValue"], "08:00");
        assert_eq!(fields["estado"]["stringValue"], "Pendiente");
        assert_eq!(fields["servicio"]["stringValue"], "Pintura");
        assert!(fields.get("fechaSolicitud").is_none());
        assert!(fields.get("descripcion").is_none());

        new.stamp_request = true;
        new.description = Some("Recámara".to_string());
        let fields = appointment_to_firestore("Pintura", &new, now);
        assert_eq!(fields["fechaSolicitud"]["timestampValue"], now.to_rfc3339());
        assert_eq!(fields["descripcion"]["stringValue"], "Recámara");
    }

    #[test]
    fn test_quotation_encoding() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();
        let mut new = NewQuotation {
            client_name: "Luis".to_string(),
            email: "luis@example.com".to_string(),
            address: None,
            phone: "3312345678".to_string(),
            description: "Fachada de dos pisos".to_string(),
            requested_on: None,
            estimated_cost: None,
        };
        let fields = quotation_to_firestore("Pintura", &new, now);
        assert_eq!(fields["fechaSolicitud"]["timestampValue"], now.to_rfc3339());
        assert!(fields.get("costoEstimado").is_none());
        assert!(fields.get("direccion").is_none());

        new.requested_on = NaiveDate::from_ymd_opt(2025, 2, 28);
        new.estimated_cost = Some(4500.0);
        new.address = Some("Calle 9".to_string());
        let fields = quotation_to_firestore("Pintura", &new, now);
        assert_eq!(fields["fechaSolicitud"]["stringValue"], "2025-02-28");
        assert_eq!(fields["costoEstimado"]["doubleValue"], 4500.0);
        assert_eq!(fields["direccion"]["stringValue"], "Calle 9");
    }
}

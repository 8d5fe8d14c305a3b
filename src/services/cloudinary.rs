// Cloudinary image hosting - uploads service photos, returns their CDN URL

use reqwest::{multipart, Client};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadErrorResponse {
    error: UploadErrorBody,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: String,
}

/// Digest used for upload signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureAlgorithm {
    /// Cloudinary's default
    Sha1,
    /// Opt-in per product environment; sent as `signature_algorithm=sha256`
    Sha256,
}

/// How uploads are authorised
#[derive(Debug, Clone)]
enum UploadAuth {
    /// API key + secret: signed upload
    Signed {
        api_key: String,
        api_secret: String,
        algorithm: SignatureAlgorithm,
    },
    /// Unsigned upload preset configured in the Cloudinary console
    Preset(String),
}

pub struct CloudinaryService {
    client: Client,
    cloud_name: Option<String>,
    auth: Option<UploadAuth>,
}

impl CloudinaryService {
    pub fn new(config: &Config) -> Self {
        let auth = match (
            &config.cloudinary_api_key,
            &config.cloudinary_api_secret,
            &config.cloudinary_upload_preset,
        ) {
            (Some(key), Some(secret), _) => Some(UploadAuth::Signed {
                api_key: key.clone(),
                api_secret: secret.clone(),
                algorithm: if config.cloudinary_sha256_signatures {
                    SignatureAlgorithm::Sha256
                } else {
                    SignatureAlgorithm::Sha1
                },
            }),
            (_, _, Some(preset)) => Some(UploadAuth::Preset(preset.clone())),
            _ => None,
        };

        Self {
            client: Client::new(),
            cloud_name: config.cloudinary_cloud_name.clone(),
            auth,
        }
    }

    fn upload_url(cloud_name: &str) -> String {
        format!("https://api.cloudinary.com/v1_1/{}/image/upload", cloud_name)
    }

    /// Upload one image into `folder` and return its https URL
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: &str,
    ) -> Result<String, ServiceError> {
        let cloud_name = self
            .cloud_name
            .as_deref()
            .ok_or("CLOUDINARY_CLOUD_NAME not configured")?;
        let auth = self
            .auth
            .as_ref()
            .ok_or("Cloudinary credentials or upload preset not configured")?;

        let file_part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("folder", folder.to_string());

        match auth {
            UploadAuth::Signed { api_key, api_secret, algorithm } => {
                let timestamp = chrono::Utc::now().timestamp().to_string();
                let signature = sign_params(
                    &[("folder", folder), ("timestamp", &timestamp)],
                    api_secret,
                    *algorithm,
                );
                form = form
                    .text("api_key", api_key.clone())
                    .text("timestamp", timestamp)
                    .text("signature", signature);
                if *algorithm == SignatureAlgorithm::Sha256 {
                    form = form.text("signature_algorithm", "sha256");
                }
            }
            UploadAuth::Preset(preset) => {
                form = form.text("upload_preset", preset.clone());
            }
        }

        let response = self
            .client
            .post(Self::upload_url(cloud_name))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<UploadErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::error!("Cloudinary upload of {} failed ({}): {}", filename, status, message);
            return Err(format!("Failed to upload image {}: {}", filename, message).into());
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::info!("Uploaded {} to {}", filename, uploaded.secure_url);
        Ok(uploaded.secure_url)
    }
}

/// Folder new images of a service go into
pub fn service_folder(service_name: &str) -> String {
    format!("servicios/{}", service_name.trim())
}

/// Cloudinary request signature: params sorted by name, joined as
/// `k=v&k=v`, secret appended, hex digest
fn sign_params(params: &[(&str, &str)], api_secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, api_secret),
        SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, api_secret),
    }
}

fn hex_digest<D: Digest>(to_sign: &str, api_secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

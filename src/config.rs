// Configuration - Environment variables

use chrono_tz::Tz;
use std::env;

const DEFAULT_TIMEZONE: &str = "America/Mexico_City";

/// Application configuration loaded from environment
#[derive(Clone, Debug)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Google Application Credentials path for Firestore
    pub google_application_credentials: Option<String>,
    /// Firebase project ID
    pub firebase_project_id: Option<String>,
    /// Firebase Web API key (for identity toolkit)
    pub firebase_api_key: Option<String>,
    /// Cloudinary cloud name (upload endpoint)
    pub cloudinary_cloud_name: Option<String>,
    /// Unsigned upload preset, used when no API secret is configured
    pub cloudinary_upload_preset: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    /// Sign uploads with SHA-256 instead of Cloudinary's default SHA-1.
    /// Only for product environments switched to SHA-256 signatures.
    pub cloudinary_sha256_signatures: bool,
    /// IANA zone the business books appointments in
    pub business_timezone: String,
    /// Optional log file, in addition to stdout
    pub log_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            google_application_credentials: env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            firebase_project_id: env::var("FIREBASE_PROJECT_ID").ok()
                .or_else(|| env::var("GCP_PROJECT_ID").ok()),
            firebase_api_key: env::var("FIREBASE_API_KEY").ok(),
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok(),
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET").ok(),
            cloudinary_api_key: env::var("CLOUDINARY_API_KEY").ok(),
            cloudinary_api_secret: env::var("CLOUDINARY_API_SECRET").ok(),
            cloudinary_sha256_signatures: env::var("CLOUDINARY_SIGNATURE_ALGORITHM")
                .map(|v| v.trim().eq_ignore_ascii_case("sha256"))
                .unwrap_or(false),
            business_timezone: env::var("BUSINESS_TIMEZONE")
                .unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string()),
            log_file: env::var("LOG_FILE").ok(),
        }
    }

    /// Firebase project ID, or the placeholder used before configuration
    pub fn project_id(&self) -> String {
        self.firebase_project_id
            .clone()
            .unwrap_or_else(|| "susticorp".to_string())
    }

    /// Parsed business time zone
    pub fn timezone(&self) -> Result<Tz, String> {
        self.business_timezone
            .parse::<Tz>()
            .map_err(|e| format!("Invalid BUSINESS_TIMEZONE {}: {}", self.business_timezone, e))
    }

    /// Validate that required configuration is present
    pub fn validate(&self) -> Result<(), String> {
        if self.google_application_credentials.is_none() {
            tracing::warn!("GOOGLE_APPLICATION_CREDENTIALS not set - Firestore will use default credentials");
        }
        if self.firebase_project_id.is_none() {
            tracing::warn!("FIREBASE_PROJECT_ID not set - using placeholder project");
        }
        if self.firebase_api_key.is_none() {
            tracing::warn!("FIREBASE_API_KEY not set - admin sign-in will fail");
        }
        if self.cloudinary_cloud_name.is_none() {
            tracing::warn!("CLOUDINARY_CLOUD_NAME not set - image uploads will fail");
        } else if self.cloudinary_api_secret.is_none() && self.cloudinary_upload_preset.is_none() {
            tracing::warn!("Neither CLOUDINARY_API_SECRET nor CLOUDINARY_UPLOAD_PRESET set - image uploads will fail");
        }
        self.timezone().map(|_| ())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            google_application_credentials: None,
            firebase_project_id: None,
            firebase_api_key: None,
            cloudinary_cloud_name: None,
            cloudinary_upload_preset: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            cloudinary_sha256_signatures: false,
            business_timezone: DEFAULT_TIMEZONE.to_string(),
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timezone_parses() {
        let config = Config::default();
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::Mexico_City);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_timezone_fails_validation() {
        let config = Config {
            business_timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_project_id_placeholder() {
        assert_eq!(Config::default().project_id(), "susticorp");
        let config = Config {
            firebase_project_id: Some("real-project".to_string()),
            ..Config::default()
        };
        assert_eq!(config.project_id(), "real-project");
    }
}

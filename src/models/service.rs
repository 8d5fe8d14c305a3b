// Service models - servicios/{service_id} and its imagenes subcollection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A service offering as shown on the public site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Document ID
    pub id: String,
    pub name: String,
    pub description: String,
    /// Free-form price range, e.g. "$1,500 - $3,000"
    pub price_range: String,
    /// When the service was created (missing on very old documents)
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub images: Vec<ServiceImage>,
}

/// servicios/{service_id}/imagenes/{image_id}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceImage {
    pub id: String,
    pub url: String,
}

/// Validated service fields, written on create and update
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFields {
    pub name: String,
    pub description: String,
    pub price_range: String,
}

/// An image file received from the admin form, before upload
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Response for status-only operations
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

impl Service {
    /// Newest first; services without a creation date go last
    pub fn sort_newest_first(services: &mut [Service]) {
        services.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn service(name: &str, created_at: Option<DateTime<Utc>>) -> Service {
        Service {
            id: name.to_lowercase(),
            name: name.to_string(),
            description: String::new(),
            price_range: String::new(),
            created_at,
            images: vec![],
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let mut services = vec![
            service("Old", Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            service("Undated", None),
            service("New", Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())),
        ];
        Service::sort_newest_first(&mut services);
        let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Old", "Undated"]);
    }
}

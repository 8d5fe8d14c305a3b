// Public "cita o cotización" request - the form on each service page

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    #[default]
    #[serde(alias = "appointment")]
    Cita,
    #[serde(alias = "quotation")]
    Cotizacion,
}

/// Request body for POST /v1/services/:service_id/requests
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRequest {
    #[serde(default)]
    pub kind: RequestKind,
    pub client_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    /// Required for citas
    pub address: Option<String>,
    /// YYYY-MM-DD, required for citas
    pub date: Option<String>,
    /// HH:MM, required for citas
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceRequestResponse {
    pub kind: RequestKind,
    pub id: String,
    pub status: super::RequestStatus,
}

/// Query for the client lookup endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PhoneLookupQuery {
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults_to_cita() {
        let request: ServiceRequest = serde_json::from_str(r#"{"client_name": "Ana"}"#).unwrap();
        assert_eq!(request.kind, RequestKind::Cita);
    }

    #[test]
    fn test_kind_accepts_english_alias() {
        let request: ServiceRequest = serde_json::from_str(r#"{"kind": "quotation"}"#).unwrap();
        assert_eq!(request.kind, RequestKind::Cotizacion);
        let request: ServiceRequest = serde_json::from_str(r#"{"kind": "cotizacion"}"#).unwrap();
        assert_eq!(request.kind, RequestKind::Cotizacion);
    }
}

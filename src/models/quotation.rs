// Quotation (cotizacion) models
// Path: servicios/{service_id}/cotizaciones/{quotation_id}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::status::RequestStatus;
use crate::validation::CostInput;

/// Quotation as stored in Firestore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quotation {
    /// Document ID
    pub id: String,
    /// Parent service document ID
    pub service_id: String,
    pub client_name: String,
    pub email: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    /// Request date: admin-entered date, or the day of the public request
    pub requested_on: Option<NaiveDate>,
    /// Service name, denormalized at creation
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    pub phone: String,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
}

impl Quotation {
    /// Most recent requests first
    pub fn sort_newest_first(items: &mut [Quotation]) {
        items.sort_by(|a, b| b.requested_on.cmp(&a.requested_on).then_with(|| a.client_name.cmp(&b.client_name)));
    }
}

/// Validated quotation ready to be written
#[derive(Debug, Clone)]
pub struct NewQuotation {
    pub client_name: String,
    pub email: String,
    pub address: Option<String>,
    pub phone: String,
    pub description: String,
    /// `None` stamps the server time
    pub requested_on: Option<NaiveDate>,
    pub estimated_cost: Option<f64>,
}

/// Request body for the admin "add quotation" form
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuotationRequest {
    pub service_id: Option<String>,
    pub client_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub requested_on: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub estimated_cost: Option<CostInput>,
}

/// Request body for setting a quotation's estimated cost
#[derive(Debug, Clone, Deserialize)]
pub struct EstimateRequest {
    pub estimated_cost: Option<CostInput>,
}

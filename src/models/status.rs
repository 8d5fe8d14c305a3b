// Request status shared by citas and cotizaciones
// Stored in Firestore as the Spanish labels the admin panel has always used

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Attended,
    Cancelled,
}

impl RequestStatus {
    /// Value written to the `estado` field
    pub fn as_stored(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pendiente",
            RequestStatus::Attended => "Atendida",
            RequestStatus::Cancelled => "Cancelada",
        }
    }

    /// Read an `estado` field. "Cancelado" was written by the old public
    /// cancel flow; anything unrecognised counts as pending.
    pub fn from_stored(value: &str) -> Self {
        match value.trim() {
            "Atendida" | "Atendido" => RequestStatus::Attended,
            "Cancelada" | "Cancelado" => RequestStatus::Cancelled,
            _ => RequestStatus::Pending,
        }
    }

    /// Parse a `status` query parameter (API or stored spelling).
    /// Empty means "all".
    pub fn parse_filter(value: &str) -> Result<Option<Self>, String> {
        match value.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "pending" | "pendiente" => Ok(Some(RequestStatus::Pending)),
            "attended" | "atendida" => Ok(Some(RequestStatus::Attended)),
            "cancelled" | "canceled" | "cancelada" => Ok(Some(RequestStatus::Cancelled)),
            other => Err(format!("Unknown status: {}", other)),
        }
    }

    pub fn is_active(&self) -> bool {
        *self != RequestStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_labels() {
        for status in [RequestStatus::Pending, RequestStatus::Attended, RequestStatus::Cancelled] {
            assert_eq!(RequestStatus::from_stored(status.as_stored()), status);
        }
        assert_eq!(RequestStatus::from_stored("Cancelado"), RequestStatus::Cancelled);
        assert_eq!(RequestStatus::from_stored("???"), RequestStatus::Pending);
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(RequestStatus::parse_filter("").unwrap(), None);
        assert_eq!(RequestStatus::parse_filter("Pendiente").unwrap(), Some(RequestStatus::Pending));
        assert_eq!(RequestStatus::parse_filter("attended").unwrap(), Some(RequestStatus::Attended));
        assert_eq!(RequestStatus::parse_filter("CANCELLED").unwrap(), Some(RequestStatus::Cancelled));
        assert!(RequestStatus::parse_filter("archived").is_err());
    }

    #[test]
    fn test_json_uses_snake_case() {
        assert_eq!(serde_json::to_string(&RequestStatus::Attended).unwrap(), "\"attended\"");
    }
}

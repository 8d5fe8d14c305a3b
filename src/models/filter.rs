// Admin list filtering: status dropdown plus phone search box

use serde::Deserialize;

use super::{Appointment, Quotation, RequestStatus};

/// Anything the admin lists can filter
pub trait Filterable {
    fn status(&self) -> RequestStatus;
    fn phone(&self) -> &str;
}

impl Filterable for Appointment {
    fn status(&self) -> RequestStatus {
        self.status
    }

    fn phone(&self) -> &str {
        &self.phone
    }
}

impl Filterable for Quotation {
    fn status(&self) -> RequestStatus {
        self.status
    }

    fn phone(&self) -> &str {
        &self.phone
    }
}

/// Query string for the admin list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilterQuery {
    /// "pending", "attended", "cancelled" or empty for all
    pub status: Option<String>,
    /// Substring of the phone number
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub status: Option<RequestStatus>,
    pub phone: Option<String>,
}

impl TryFrom<ListFilterQuery> for RecordFilter {
    type Error = String;

    fn try_from(query: ListFilterQuery) -> Result<Self, Self::Error> {
        let status = match query.status.as_deref() {
            Some(s) => RequestStatus::parse_filter(s)?,
            None => None,
        };
        let phone = query
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Ok(Self { status, phone })
    }
}

impl RecordFilter {
    pub fn matches<T: Filterable>(&self, item: &T) -> bool {
        let status_ok = self.status.map_or(true, |s| item.status() == s);
        let phone_ok = self
            .phone
            .as_deref()
            .map_or(true, |term| item.phone().contains(term));
        status_ok && phone_ok
    }

    pub fn apply<T: Filterable>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(id: &str, phone: &str, status: RequestStatus) -> Appointment {
        Appointment {
            id: id.to_string(),
            service_id: "svc".to_string(),
            client_name: "Cliente".to_string(),
            date: "2025-05-01".to_string(),
            time: "10:00".to_string(),
            service_name: "Impermeabilización".to_string(),
            status,
            phone: phone.to_string(),
            email: "c@example.com".to_string(),
            address: "Calle 1".to_string(),
            description: None,
            requested_at: None,
        }
    }

    fn ids(items: &[Appointment]) -> Vec<&str> {
        items.iter().map(|a| a.id.as_str()).collect()
    }

    fn sample() -> Vec<Appointment> {
        vec![
            appointment("a", "5511112222", RequestStatus::Pending),
            appointment("b", "5533334444", RequestStatus::Attended),
            appointment("c", "3311112222", RequestStatus::Cancelled),
        ]
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = RecordFilter::try_from(ListFilterQuery::default()).unwrap();
        assert_eq!(ids(&filter.apply(sample())), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_status_and_phone_combine() {
        let filter = RecordFilter::try_from(ListFilterQuery {
            status: Some("pending".to_string()),
            phone: Some("1111".to_string()),
        })
        .unwrap();
        assert_eq!(ids(&filter.apply(sample())), vec!["a"]);
    }

    #[test]
    fn test_phone_is_substring_match() {
        let filter = RecordFilter {
            status: None,
            phone: Some("1111".to_string()),
        };
        assert_eq!(ids(&filter.apply(sample())), vec!["a", "c"]);
    }

    #[test]
    fn test_blank_terms_are_ignored() {
        let filter = RecordFilter::try_from(ListFilterQuery {
            status: Some(String::new()),
            phone: Some("  ".to_string()),
        })
        .unwrap();
        assert_eq!(filter, RecordFilter::default());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = RecordFilter::try_from(ListFilterQuery {
            status: Some("archived".to_string()),
            phone: None,
        });
        assert!(result.is_err());
    }
}

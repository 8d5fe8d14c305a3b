// Form validation shared by the public and admin endpoints

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::ApiError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const PHONE_DIGITS: usize = 10;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"))
}

/// Trimmed, non-empty value of a required field
pub fn require(field: &str, value: Option<&str>) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::validation(format!("{} is required", field))),
    }
}

/// Trimmed value of an optional field, `None` when blank
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(ApiError::validation("Please enter a valid email address"))
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ApiError> {
    if phone.len() == PHONE_DIGITS && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ApiError::validation("Phone number must have exactly 10 digits"))
    }
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::validation(format!("{} must be a date in YYYY-MM-DD format", field)))
}

pub fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| ApiError::validation(format!("{} must be a time in HH:MM format", field)))
}

/// Estimated cost as sent by the admin form: a JSON number or numeric text
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CostInput {
    Number(f64),
    Text(String),
}

pub fn parse_estimated_cost(input: Option<&CostInput>) -> Result<f64, ApiError> {
    let value = match input {
        Some(CostInput::Number(n)) => Some(*n),
        Some(CostInput::Text(s)) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => return Err(ApiError::validation("estimated_cost is required")),
    };
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ApiError::validation("estimated_cost must be a valid number")),
    }
}

/// Name, email and phone: the fields every cita/cotización carries
pub fn contact(
    client_name: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<(String, String, String), ApiError> {
    let client_name = require("client_name", client_name)?;
    let email = require("email", email)?;
    let phone = require("phone", phone)?;
    validate_email(&email)?;
    validate_phone(&phone)?;
    Ok((client_name, email, phone))
}

//! Domain tools available to the leaf workers.
//!
//! Every tool issues one or two queries against the [`SlotStore`] and returns a
//! plain-text result string. "Nothing available" is a normal result, not an
//! error; only malformed arguments ([`AppError::InvalidInput`]) and storage
//! failures ([`AppError::Persistence`]) are reported as errors.
//!
//! # Module Structure
//!
//! - [`registry`] - `Tool` trait and name-keyed registry
//! - [`doctor`] - doctor availability, booking, cancellation and rescheduling
//! - [`lab`] - lab slot availability, lab booking and test prerequisites
//!
//! Dates are exchanged as `DD-MM-YYYY`, slot timestamps as `DD-MM-YYYY HH:MM`.

/// Doctor appointment tools.
pub mod doctor;
/// Lab test tools.
pub mod lab;
/// Tool registry for managing available tools.
pub mod registry;

use crate::db::SlotStore;
use crate::types::{AppError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use registry::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;

pub use registry::Tool;

/// Open slots for one doctor on one date.
pub const CHECK_AVAILABILITY_BY_DOCTOR: &str = "check_availability_by_doctor";
/// Open slots for every doctor of a specialization on one date.
pub const CHECK_AVAILABILITY_BY_SPECIALIZATION: &str = "check_availability_by_specialization";
/// Book a doctor slot for the requesting patient.
pub const SET_APPOINTMENT: &str = "set_appointment";
/// Release a slot the patient holds.
pub const CANCEL_APPOINTMENT: &str = "cancel_appointment";
/// Move a held appointment to another slot.
pub const RESCHEDULE_APPOINTMENT: &str = "reschedule_appointment";
/// Open lab slots on one date.
pub const CHECK_LAB_AVAILABILITY: &str = "check_lab_availability";
/// Reserve a lab slot for the requesting patient.
pub const CREATE_LAB_BOOKING_REQUEST: &str = "create_lab_booking_request";
/// Preparation required before a lab test.
pub const VALIDATE_TEST_PREREQUISITES: &str = "validate_test_prerequisites";

const DATE_FORMAT: &str = "%d-%m-%Y";
const DATE_TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Registry holding every domain tool, all backed by the same store.
pub fn domain_registry(store: Arc<SlotStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(doctor::CheckAvailabilityByDoctor::new(store.clone())));
    registry.register(Arc::new(doctor::CheckAvailabilityBySpecialization::new(store.clone())));
    registry.register(Arc::new(doctor::SetAppointment::new(store.clone())));
    registry.register(Arc::new(doctor::CancelAppointment::new(store.clone())));
    registry.register(Arc::new(doctor::RescheduleAppointment::new(store.clone())));

    registry.register(Arc::new(lab::CheckLabAvailability::new(store.clone())));
    registry.register(Arc::new(lab::CreateLabBookingRequest::new(store.clone())));
    registry.register(Arc::new(lab::ValidateTestPrerequisites::new(store)));

    registry
}

/// Parse a `DD-MM-YYYY` date and return it zero-padded.
pub fn normalize_date(raw: &str) -> Result<String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(|d| d.format(DATE_FORMAT).to_string())
        .map_err(|_| {
            AppError::InvalidInput(format!(
                "'{}' is not a valid date, expected DD-MM-YYYY",
                raw
            ))
        })
}

/// Parse a `DD-MM-YYYY HH:MM` slot timestamp and return it zero-padded.
pub fn normalize_date_time(raw: &str) -> Result<String> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_TIME_FORMAT)
        .map(|d| d.format(DATE_TIME_FORMAT).to_string())
        .map_err(|_| {
            AppError::InvalidInput(format!(
                "'{}' is not a valid date and time, expected DD-MM-YYYY HH:MM",
                raw
            ))
        })
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("Missing required argument '{}'", key)))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Patient ids arrive as numbers, but models sometimes quote them.
pub(crate) fn patient_id(args: &Value) -> Result<i64> {
    match args.get("patient_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::InvalidInput("Missing or invalid 'patient_id'".to_string()))
}

pub(crate) fn patient_id_schema() -> Value {
    serde_json::json!({
        "type": "integer",
        "description": "Identification number of the patient"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("18-12-2024", "18-12-2024")]
    #[case("8-1-2025", "08-01-2025")]
    #[case(" 01-02-2025 ", "01-02-2025")]
    fn test_normalize_date_accepts(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_date(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("2024-12-18")]
    #[case("31-02-2024")]
    #[case("tomorrow")]
    fn test_normalize_date_rejects(#[case] raw: &str) {
        assert!(matches!(normalize_date(raw), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_normalize_date_time_pads_hour() {
        assert_eq!(
            normalize_date_time("18-12-2024 9:00").unwrap(),
            "18-12-2024 09:00"
        );
        assert!(normalize_date_time("18-12-2024").is_err());
    }

    #[test]
    fn test_patient_id_accepts_numeric_string() {
        assert_eq!(patient_id(&json!({"patient_id": "1234567"})).unwrap(), 1234567);
        assert_eq!(patient_id(&json!({"patient_id": 42})).unwrap(), 42);
        assert!(patient_id(&json!({"patient_id": "abc"})).is_err());
        assert!(patient_id(&json!({})).is_err());
    }
}

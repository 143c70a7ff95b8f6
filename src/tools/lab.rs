use crate::db::{LabBookingOutcome, LabSlot, SlotStore};
use crate::tools::registry::Tool;
use crate::tools::{
    normalize_date, normalize_date_time, optional_str, patient_id, patient_id_schema,
    required_str, CHECK_LAB_AVAILABILITY, CREATE_LAB_BOOKING_REQUEST, VALIDATE_TEST_PREREQUISITES,
};
use crate::types::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const NO_PREREQUISITES: &str = "No specific prerequisites required.";

/// Lists open lab slots on one date.
pub struct CheckLabAvailability {
    store: Arc<SlotStore>,
}

impl CheckLabAvailability {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckLabAvailability {
    fn name(&self) -> &str {
        CHECK_LAB_AVAILABILITY
    }

    fn description(&self) -> &str {
        "List open lab test slots on a date, optionally for one test only"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Date in DD-MM-YYYY format" },
                "test_name": {
                    "type": "string",
                    "description": "Optional test, e.g. 'lipid panel', 'complete blood count', 'ecg'"
                }
            },
            "required": ["date"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let date = normalize_date(required_str(&args, "date")?)?;
        let test_name = optional_str(&args, "test_name");
        debug!(%date, ?test_name, "checking lab availability");

        let slots = self.store.lab_availability(&date, test_name).await?;
        Ok(Value::String(format_lab_availability(&date, test_name, &slots)))
    }
}

/// Reserves a lab slot for the requesting patient.
pub struct CreateLabBookingRequest {
    store: Arc<SlotStore>,
}

impl CreateLabBookingRequest {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateLabBookingRequest {
    fn name(&self) -> &str {
        CREATE_LAB_BOOKING_REQUEST
    }

    fn description(&self) -> &str {
        "Reserve an open lab test slot for the patient and return a booking reference"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date_time": { "type": "string", "description": "Slot in DD-MM-YYYY HH:MM format" },
                "test_name": { "type": "string" },
                "patient_id": patient_id_schema()
            },
            "required": ["date_time", "test_name", "patient_id"]
        })
    }

    fn takes_patient_id(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let slot = normalize_date_time(required_str(&args, "date_time")?)?;
        let test_name = required_str(&args, "test_name")?;
        let patient = patient_id(&args)?;

        let text = match self.store.book_lab_test(test_name, &slot, patient).await? {
            LabBookingOutcome::Booked { test_name, price } => format!(
                "BOOKING_CREATED: Booking {} created. Test: {}, Date: {}, Amount: ${:.2}.",
                booking_reference(),
                test_name,
                slot,
                price
            ),
            LabBookingOutcome::Unavailable => format!(
                "BOOKING_UNAVAILABLE: No available slots for {} at {}",
                test_name, slot
            ),
        };
        Ok(Value::String(text))
    }
}

/// Reports the preparation a lab test needs.
pub struct ValidateTestPrerequisites {
    store: Arc<SlotStore>,
}

impl ValidateTestPrerequisites {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ValidateTestPrerequisites {
    fn name(&self) -> &str {
        VALIDATE_TEST_PREREQUISITES
    }

    fn description(&self) -> &str {
        "Look up preparation requirements for a lab test, such as fasting"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "test_name": { "type": "string" },
                "patient_id": patient_id_schema()
            },
            "required": ["test_name", "patient_id"]
        })
    }

    fn takes_patient_id(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let test_name = required_str(&args, "test_name")?;
        let patient = patient_id(&args)?;

        let text = match self.store.lab_prerequisites(test_name).await? {
            Some(prerequisites) => format!(
                "Prerequisites for {}:\n{}\n\nPatient ID: {}",
                test_name,
                prerequisites.as_deref().unwrap_or(NO_PREREQUISITES),
                patient
            ),
            None => format!("Test {} not found in the system.", test_name),
        };
        Ok(Value::String(text))
    }
}

/// `LAB-` followed by eight upper-case hex digits.
fn booking_reference() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("LAB-{}", hex[..8].to_uppercase())
}

fn format_lab_availability(date: &str, test_name: Option<&str>, slots: &[LabSlot]) -> String {
    if slots.is_empty() {
        return match test_name {
            Some(test) => format!("No available lab test slots on {} for {}", date, test),
            None => format!("No available lab test slots on {}", date),
        };
    }

    let mut output = format!("Available lab test slots on {}:\n", date);
    let mut start = 0;
    while start < slots.len() {
        let test = &slots[start].test_name;
        let end = slots[start..]
            .iter()
            .position(|s| &s.test_name != test)
            .map_or(slots.len(), |offset| start + offset);

        let times: Vec<String> = slots[start..end]
            .iter()
            .map(|s| format!("{} (${:.2})", s.time, s.price))
            .collect();
        output.push_str(&format!("{}: {}\n", test, times.join(", ")));
        start = end;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_reference_shape() {
        let reference = booking_reference();
        assert_eq!(reference.len(), 12);
        assert!(reference.starts_with("LAB-"));
        assert!(reference[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_lab_availability_groups_by_test() {
        let slots = vec![
            LabSlot {
                test_name: "ecg".to_string(),
                time: "09:00".to_string(),
                price: 25.0,
            },
            LabSlot {
                test_name: "lipid panel".to_string(),
                time: "08:00".to_string(),
                price: 40.5,
            },
            LabSlot {
                test_name: "lipid panel".to_string(),
                time: "08:30".to_string(),
                price: 40.5,
            },
        ];
        let text = format_lab_availability("20-12-2024", None, &slots);
        assert_eq!(
            text,
            "Available lab test slots on 20-12-2024:\necg: 09:00 ($25.00)\nlipid panel: 08:00 ($40.50), 08:30 ($40.50)\n"
        );
    }

    #[test]
    fn test_empty_lab_availability_mentions_test() {
        assert_eq!(
            format_lab_availability("20-12-2024", Some("ecg"), &[]),
            "No available lab test slots on 20-12-2024 for ecg"
        );
        assert_eq!(
            format_lab_availability("20-12-2024", None, &[]),
            "No available lab test slots on 20-12-2024"
        );
    }
}

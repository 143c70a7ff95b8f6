use crate::db::{BookingOutcome, CancelOutcome, DoctorSlot, RescheduleOutcome, SlotStore};
use crate::tools::registry::Tool;
use crate::tools::{
    normalize_date, normalize_date_time, patient_id, patient_id_schema, required_str,
    CANCEL_APPOINTMENT, CHECK_AVAILABILITY_BY_DOCTOR, CHECK_AVAILABILITY_BY_SPECIALIZATION,
    RESCHEDULE_APPOINTMENT, SET_APPOINTMENT,
};
use crate::types::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Lists a doctor's open slots on one date.
pub struct CheckAvailabilityByDoctor {
    store: Arc<SlotStore>,
}

impl CheckAvailabilityByDoctor {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityByDoctor {
    fn name(&self) -> &str {
        CHECK_AVAILABILITY_BY_DOCTOR
    }

    fn description(&self) -> &str {
        "List the open appointment times of a specific doctor on a given date, with the consultation fee"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Date in DD-MM-YYYY format" },
                "doctor_name": { "type": "string", "description": "Doctor's full name, e.g. 'sarah wilson'" }
            },
            "required": ["date", "doctor_name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let date = normalize_date(required_str(&args, "date")?)?;
        let doctor = required_str(&args, "doctor_name")?;
        debug!(doctor, %date, "checking doctor availability");

        let slots = self.store.doctor_availability(doctor, &date).await?;
        Ok(Value::String(format_doctor_availability(doctor, &date, &slots)))
    }
}

/// Lists open slots of every doctor with a specialization on one date.
pub struct CheckAvailabilityBySpecialization {
    store: Arc<SlotStore>,
}

impl CheckAvailabilityBySpecialization {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityBySpecialization {
    fn name(&self) -> &str {
        CHECK_AVAILABILITY_BY_SPECIALIZATION
    }

    fn description(&self) -> &str {
        "List every doctor of a specialization with open appointment times on a given date"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Date in DD-MM-YYYY format" },
                "specialization": {
                    "type": "string",
                    "description": "Specialization, e.g. 'cardiology', 'general_medicine', 'sport_medicine'"
                }
            },
            "required": ["date", "specialization"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let date = normalize_date(required_str(&args, "date")?)?;
        let specialization = required_str(&args, "specialization")?;
        debug!(specialization, %date, "checking specialization availability");

        let slots = self
            .store
            .specialization_availability(specialization, &date)
            .await?;
        Ok(Value::String(format_specialization_availability(
            specialization,
            &date,
            &slots,
        )))
    }
}

/// Books a doctor slot for the requesting patient.
pub struct SetAppointment {
    store: Arc<SlotStore>,
}

impl SetAppointment {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SetAppointment {
    fn name(&self) -> &str {
        SET_APPOINTMENT
    }

    fn description(&self) -> &str {
        "Book an open appointment slot with a doctor for the patient"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date_time": { "type": "string", "description": "Slot in DD-MM-YYYY HH:MM format" },
                "doctor_name": { "type": "string" },
                "patient_id": patient_id_schema()
            },
            "required": ["date_time", "doctor_name", "patient_id"]
        })
    }

    fn takes_patient_id(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let slot = normalize_date_time(required_str(&args, "date_time")?)?;
        let doctor = required_str(&args, "doctor_name")?;
        let patient = patient_id(&args)?;

        let text = match self.store.book_appointment(doctor, &slot, patient).await? {
            BookingOutcome::Booked { consultation_fee } => format!(
                "Successfully booked Dr. {} for {} (Patient ID: {}{})",
                doctor,
                slot,
                patient,
                fee_suffix(consultation_fee)
            ),
            BookingOutcome::Unavailable => {
                format!("No available appointments for Dr. {} at {}", doctor, slot)
            }
        };
        Ok(Value::String(text))
    }
}

/// Releases a slot held by the requesting patient.
pub struct CancelAppointment {
    store: Arc<SlotStore>,
}

impl CancelAppointment {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CancelAppointment {
    fn name(&self) -> &str {
        CANCEL_APPOINTMENT
    }

    fn description(&self) -> &str {
        "Cancel the patient's existing appointment with a doctor at a given slot"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date_time": { "type": "string", "description": "Booked slot in DD-MM-YYYY HH:MM format" },
                "doctor_name": { "type": "string" },
                "patient_id": patient_id_schema()
            },
            "required": ["date_time", "doctor_name", "patient_id"]
        })
    }

    fn takes_patient_id(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let slot = normalize_date_time(required_str(&args, "date_time")?)?;
        let doctor = required_str(&args, "doctor_name")?;
        let patient = patient_id(&args)?;

        let text = match self.store.cancel_appointment(doctor, &slot, patient).await? {
            CancelOutcome::Cancelled => format!(
                "Successfully cancelled the appointment with Dr. {} on {} (Patient ID: {})",
                doctor, slot, patient
            ),
            CancelOutcome::NotFound => no_appointment_found(doctor, &slot, patient),
        };
        Ok(Value::String(text))
    }
}

/// Moves the requesting patient's appointment to a new slot.
pub struct RescheduleAppointment {
    store: Arc<SlotStore>,
}

impl RescheduleAppointment {
    /// Tool reading and writing `store`.
    pub fn new(store: Arc<SlotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RescheduleAppointment {
    fn name(&self) -> &str {
        RESCHEDULE_APPOINTMENT
    }

    fn description(&self) -> &str {
        "Move the patient's appointment with a doctor from one slot to another"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "old_date_time": { "type": "string", "description": "Currently booked slot, DD-MM-YYYY HH:MM" },
                "new_date_time": { "type": "string", "description": "Requested slot, DD-MM-YYYY HH:MM" },
                "doctor_name": { "type": "string" },
                "patient_id": patient_id_schema()
            },
            "required": ["old_date_time", "new_date_time", "doctor_name", "patient_id"]
        })
    }

    fn takes_patient_id(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let old_slot = normalize_date_time(required_str(&args, "old_date_time")?)?;
        let new_slot = normalize_date_time(required_str(&args, "new_date_time")?)?;
        let doctor = required_str(&args, "doctor_name")?;
        let patient = patient_id(&args)?;

        let outcome = self
            .store
            .reschedule_appointment(doctor, &old_slot, &new_slot, patient)
            .await?;

        let text = match outcome {
            RescheduleOutcome::Rescheduled { consultation_fee } => format!(
                "Successfully rescheduled appointment with Dr. {} from {} to {} (Patient ID: {}{})",
                doctor,
                old_slot,
                new_slot,
                patient,
                fee_suffix(consultation_fee)
            ),
            RescheduleOutcome::NewSlotUnavailable => {
                format!("Not available slots for Dr. {} at {}", doctor, new_slot)
            }
            RescheduleOutcome::NoExistingAppointment => {
                no_appointment_found(doctor, &old_slot, patient)
            }
        };
        Ok(Value::String(text))
    }
}

fn fee_suffix(fee: f64) -> String {
    if fee > 0.0 {
        format!(", Consultation Fee: ${:.2}", fee)
    } else {
        String::new()
    }
}

fn no_appointment_found(doctor: &str, slot: &str, patient: i64) -> String {
    format!(
        "No appointment found for Dr. {} on {} for patient ID {}",
        doctor, slot, patient
    )
}

fn format_doctor_availability(doctor: &str, date: &str, slots: &[DoctorSlot]) -> String {
    let Some(first) = slots.first() else {
        return format!("No availability for Dr. {} on {}", doctor, date);
    };

    let times: Vec<&str> = slots.iter().map(|s| s.time.as_str()).collect();
    let mut output = format!("Availability for Dr. {} on {}:\n{}", doctor, date, times.join(", "));
    if first.consultation_fee > 0.0 {
        output.push_str(&format!("\nConsultation Fee: ${:.2}", first.consultation_fee));
    }
    output
}

fn format_specialization_availability(specialization: &str, date: &str, slots: &[DoctorSlot]) -> String {
    if slots.is_empty() {
        return format!(
            "No availability for {} on {}",
            specialization.replace('_', " "),
            date
        );
    }

    // Slots arrive ordered by doctor, so consecutive runs form each group.
    let mut output = format!("This availability for {}\n", date);
    let mut start = 0;
    while start < slots.len() {
        let doctor = &slots[start].doctor_name;
        let end = slots[start..]
            .iter()
            .position(|s| &s.doctor_name != doctor)
            .map_or(slots.len(), |offset| start + offset);
        let group = &slots[start..end];

        let times: Vec<String> = group.iter().map(|s| to_am_pm(&s.time)).collect();
        let fee = group[0].consultation_fee;
        let fee_str = if fee > 0.0 {
            format!(" (Fee: ${:.2})", fee)
        } else {
            String::new()
        };
        output.push_str(&format!(
            "{}: Available slots → {}{}\n",
            doctor,
            times.join(", "),
            fee_str
        ));
        start = end;
    }
    output
}

fn to_am_pm(time: &str) -> String {
    match chrono::NaiveTime::parse_from_str(time, "%H:%M") {
        Ok(t) => t.format("%-I:%M %p").to_string(),
        Err(_) => time.to_string(),
    }
}

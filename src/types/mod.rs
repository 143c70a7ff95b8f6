use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============= Request/Response Types =============

/// Inbound request: one patient message for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Patient identifier the turn acts on behalf of
    pub patient_id: i64,
    /// The patient's natural-language message
    pub message: String,
}

/// Outbound response: every message produced while handling the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Ordered message log, starting with the patient's own message
    pub messages: Vec<ChatEntry>,
}

impl ExecuteResponse {
    /// Content of the last `FinalAnswer` entry, if the turn produced one.
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.producer == Producer::FinalAnswer)
            .map(|m| m.content.as_str())
    }
}

// ============= Conversation Types =============

/// Identity of whoever appended a message to the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    /// The patient
    User,
    /// Entry supervisor choosing between the doctor and lab teams
    TopSupervisor,
    /// Supervisor of the doctor workers
    DoctorSupervisor,
    /// Supervisor of the lab workers
    LabSupervisor,
    /// Doctor availability worker
    DoctorInfoWorker,
    /// Doctor booking, cancellation and rescheduling worker
    DoctorBookingWorker,
    /// Lab booking worker
    LabBookingWorker,
    /// Lab availability and prerequisites worker
    LabInfoWorker,
    /// Answer handed back to the patient at the end of a turn
    FinalAnswer,
}

impl Producer {
    /// Leaf workers are the only producers whose replies carry tool-backed facts.
    pub fn is_worker(&self) -> bool {
        matches!(
            self,
            Producer::DoctorInfoWorker
                | Producer::DoctorBookingWorker
                | Producer::LabBookingWorker
                | Producer::LabInfoWorker
        )
    }

    /// Supervisors only ever append routing summaries.
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            Producer::TopSupervisor | Producer::DoctorSupervisor | Producer::LabSupervisor
        )
    }

    /// Wire name, as used in JSON output and transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Producer::User => "user",
            Producer::TopSupervisor => "top_supervisor",
            Producer::DoctorSupervisor => "doctor_supervisor",
            Producer::LabSupervisor => "lab_supervisor",
            Producer::DoctorInfoWorker => "doctor_info_worker",
            Producer::DoctorBookingWorker => "doctor_booking_worker",
            Producer::LabBookingWorker => "lab_booking_worker",
            Producer::LabInfoWorker => "lab_info_worker",
            Producer::FinalAnswer => "final_answer",
        }
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Who appended the entry
    pub producer: Producer,
    /// Message text
    pub content: String,
}

impl ChatEntry {
    /// Entry for any producer.
    pub fn new(producer: Producer, content: impl Into<String>) -> Self {
        Self {
            producer,
            content: content.into(),
        }
    }

    /// Entry written by the patient.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Producer::User, content)
    }
}

/// Per-request state owned by one turn and passed through every hop of the routing graph.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// Append-only message log
    pub messages: Vec<ChatEntry>,
    /// Patient the turn acts for
    pub patient_id: i64,
    /// Routing decisions taken so far, across every level
    pub steps_taken: u32,
    /// Label of the last chosen route
    pub next: Option<String>,
    /// Rationale of the last routing decision
    pub current_reasoning: String,
    /// Instructions the last routing decision left for the chosen agent
    pub current_instructions: String,
    /// Rendered long-term memory, injected into every prompt
    pub memory_context: String,
}

impl ConversationState {
    /// Fresh state for a new request, seeded with the patient's message.
    pub fn new(patient_id: i64, message: impl Into<String>, memory_context: String) -> Self {
        Self {
            messages: vec![ChatEntry::user(message)],
            patient_id,
            memory_context,
            ..Default::default()
        }
    }

    /// Append an entry to the log.
    pub fn push(&mut self, producer: Producer, content: impl Into<String>) {
        self.messages.push(ChatEntry::new(producer, content));
    }

    /// Whether any leaf worker has replied during this request.
    pub fn has_worker_reply(&self) -> bool {
        self.messages.iter().any(|m| m.producer.is_worker())
    }
}

/// Structured output of one routing call, as returned by the model.
///
/// `next` is still untrusted text here; supervisors parse it against their
/// own closed set of routes before acting on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Chosen route label
    pub next: String,
    /// Why the route was chosen
    #[serde(default)]
    pub reasoning: String,
    /// What the chosen agent should do
    #[serde(default)]
    pub instructions: String,
}

// ============= Memory Types =============

/// Long-term memory persisted per patient.
///
/// Decoding accepts records from older writers: naive timestamps are read as
/// UTC, and `null` or missing fields fall back to empty values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Recap of the patient's conversations so far
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    /// Extracted facts such as `preferred_doctor` or `lab_test`
    #[serde(default, deserialize_with = "lenient_slots")]
    pub slots: BTreeMap<String, String>,
    /// When the record was last written
    #[serde(default = "unknown_timestamp", deserialize_with = "lenient_timestamp")]
    pub last_updated: DateTime<Utc>,
}

/// Read-only reference data about a patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    /// Doctor the patient usually sees
    #[serde(default)]
    pub preferred_doctor: Option<String>,
    /// Insurance policy number
    #[serde(default)]
    pub insurance_id: Option<String>,
    /// Whether the patient's identity has been verified
    #[serde(default, deserialize_with = "null_as_default")]
    pub verified: bool,
}

/// Everything the memory subsystem knows about a patient before a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryBundle {
    /// Stored summary, empty for a new patient
    pub summary: String,
    /// Stored slots
    pub slots: BTreeMap<String, String>,
    /// Profile, default when none is on file
    pub profile: PatientProfile,
    /// Time of the last stored update, if any
    pub last_updated: Option<DateTime<Utc>>,
}

impl MemoryBundle {
    /// Whether nothing has been stored for the patient yet.
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.slots.is_empty() && self.last_updated.is_none()
    }

    /// Verification flag from the patient profile.
    pub fn is_verified(&self) -> bool {
        self.profile.verified
    }
}

/// Summarizer output before it is merged into the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUpdate {
    /// Replaces the stored summary
    pub summary: String,
    /// Merged into the stored slots, new values winning
    pub slots: BTreeMap<String, String>,
}

/// Flatten a JSON slot object into text values. `null` entries are dropped;
/// numbers and booleans keep their JSON spelling.
pub fn stringify_slots(map: Map<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_slots<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?
        .map(stringify_slots)
        .unwrap_or_default())
}

fn unknown_timestamp() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// RFC 3339 first, then a naive `YYYY-MM-DD[T ]HH:MM:SS[.ffffff]` read as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(unknown_timestamp());
    };
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognised timestamp '{}'", raw))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(unknown_timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

// ============= Tool Types =============

/// Tool description offered to the model.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDefinition {
    /// Tool name the model calls
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Decoded argument object, or the raw text when it was not valid JSON
    pub arguments: Value,
}

// ============= Error Types =============

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Slot database or memory store unavailable
    #[error("Persistence unavailable: {0}")]
    Persistence(String),

    /// Provider transport or protocol failure
    #[error("LLM error: {0}")]
    LLM(String),

    /// Routing or structured output outside what was asked for
    #[error("Malformed routing decision: {0}")]
    MalformedDecision(String),

    /// Unknown tool or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad tool arguments or request fields
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<libsql::Error> for AppError {
    fn from(err: libsql::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_worker_and_routing_producers_are_disjoint() {
        let all = [
            Producer::User,
            Producer::TopSupervisor,
            Producer::DoctorSupervisor,
            Producer::LabSupervisor,
            Producer::DoctorInfoWorker,
            Producer::DoctorBookingWorker,
            Producer::LabBookingWorker,
            Producer::LabInfoWorker,
            Producer::FinalAnswer,
        ];
        for p in all {
            assert!(!(p.is_worker() && p.is_routing()), "{p} is both");
        }
        assert_eq!(all.iter().filter(|p| p.is_worker()).count(), 4);
        assert!(!Producer::FinalAnswer.is_worker());
        assert!(!Producer::User.is_routing());
    }

    #[test]
    fn test_producer_serializes_snake_case() {
        let entry = ChatEntry::new(Producer::DoctorBookingWorker, "done");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["producer"], "doctor_booking_worker");
    }

    #[test]
    fn test_state_detects_worker_reply() {
        let mut state = ConversationState::new(7, "hi", String::new());
        assert!(!state.has_worker_reply());
        state.push(Producer::TopSupervisor, "Supervisor routed to doctor_agent.");
        assert!(!state.has_worker_reply());
        state.push(Producer::LabInfoWorker, "CBC is available");
        assert!(state.has_worker_reply());
    }

    #[test]
    fn test_memory_record_tolerates_missing_fields() {
        let record: MemoryRecord = serde_json::from_str("{}").unwrap();
        assert!(record.summary.is_empty());
        assert!(record.slots.is_empty());
        assert_eq!(record.last_updated, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_memory_record_reads_naive_timestamp_as_utc() {
        let record: MemoryRecord = serde_json::from_str(
            r#"{"summary":"s","slots":{},"last_updated":"2024-12-18T10:00:00.123456"}"#,
        )
        .unwrap();
        assert_eq!(record.last_updated.year(), 2024);
        assert_eq!(record.last_updated.hour(), 10);
        assert_eq!(record.last_updated.nanosecond(), 123_456_000);

        let offset: MemoryRecord =
            serde_json::from_str(r#"{"last_updated":"2024-12-18T10:00:00+05:30"}"#).unwrap();
        assert_eq!(offset.last_updated.hour(), 4);
    }

    #[test]
    fn test_memory_record_nulls_become_empty() {
        let record: MemoryRecord = serde_json::from_str(
            r#"{"summary":null,"slots":null,"last_updated":null}"#,
        )
        .unwrap();
        assert!(record.summary.is_empty());
        assert!(record.slots.is_empty());
        assert_eq!(record.last_updated, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_memory_record_stringifies_slot_values() {
        let record: MemoryRecord = serde_json::from_str(
            r#"{"slots":{"visits":2,"fasting":true,"gone":null,"doctor":"sarah wilson"}}"#,
        )
        .unwrap();
        assert_eq!(record.slots.get("visits").map(String::as_str), Some("2"));
        assert_eq!(record.slots.get("fasting").map(String::as_str), Some("true"));
        assert_eq!(record.slots.get("doctor").map(String::as_str), Some("sarah wilson"));
        assert!(!record.slots.contains_key("gone"));
    }

    #[test]
    fn test_memory_record_rejects_garbage_timestamp() {
        let result = serde_json::from_str::<MemoryRecord>(r#"{"last_updated":"yesterday"}"#);
        assert!(result.is_err());
    }
}

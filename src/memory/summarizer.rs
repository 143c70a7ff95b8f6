use crate::llm::{ConversationMessage, LLMClient, StructuredSchema};
use crate::types::{stringify_slots, AppError, MemoryUpdate, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const SUMMARY_PROMPT: &str = "You maintain persistent memory for a medical appointment assistant. \
Return a JSON object with two keys: summary (a concise recap of actionable facts) and slots \
(key-value pairs such as preferred_doctor, symptoms, appointment_date, lab_test, insurance_id, \
next_action). Only include slots that were explicitly mentioned.";

/// Turns a transcript into a summary and slot update.
#[async_trait]
pub trait ConversationSummarizer: Send + Sync {
    /// Summarize a role-tagged transcript.
    async fn summarize(&self, transcript: &str) -> Result<MemoryUpdate>;
}

/// Shape requested from the model. Slot values are loosely typed on the wire.
#[derive(JsonSchema)]
#[allow(dead_code)]
struct SummaryPayload {
    summary: String,
    slots: BTreeMap<String, String>,
}

/// Summarizer backed by structured LLM output.
pub struct LLMSummarizer {
    client: Arc<dyn LLMClient>,
}

impl LLMSummarizer {
    /// Summarizer calling `client`.
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConversationSummarizer for LLMSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<MemoryUpdate> {
        let messages = [
            ConversationMessage::system(SUMMARY_PROMPT),
            ConversationMessage::user(format!("Conversation transcript:\n{}", transcript)),
        ];
        let schema = StructuredSchema::for_type::<SummaryPayload>("memory_record");

        let value = self.client.generate_structured(&messages, &schema).await?;
        parse_update(value)
    }
}

/// Validate summarizer output. Anything without a string summary is rejected
/// so the stored record is never overwritten with garbage.
pub fn parse_update(value: Value) -> Result<MemoryUpdate> {
    let Value::Object(mut object) = value else {
        return Err(AppError::MalformedDecision(
            "memory summary is not a JSON object".to_string(),
        ));
    };

    let summary = match object.remove("summary") {
        Some(Value::String(s)) => s,
        _ => {
            return Err(AppError::MalformedDecision(
                "memory summary is missing a 'summary' string".to_string(),
            ))
        }
    };

    let slots = match object.remove("slots") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => stringify_slots(map),
        Some(_) => {
            return Err(AppError::MalformedDecision(
                "memory summary 'slots' is not an object".to_string(),
            ))
        }
    };

    Ok(MemoryUpdate { summary, slots })
}

use crate::{
    agents::{prompts, Agent},
    llm::{FinishReason, ToolCoordinator},
    types::{ConversationState, Producer, Result},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reply recorded when the model said nothing and no tool call succeeded.
pub const NO_ANSWER_REPLY: &str =
    "I couldn't find an answer to that just now. Could you rephrase or give more details?";

/// Leaf agent that answers with the help of a fixed set of tools.
///
/// Each delegation appends exactly one message under the worker's producer.
pub struct ToolWorker {
    name: String,
    description: String,
    producer: Producer,
    system_prompt: String,
    allowed_tools: Vec<&'static str>,
    coordinator: Arc<ToolCoordinator>,
}

impl ToolWorker {
    /// Worker named `name` that may call only `allowed_tools`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        producer: Producer,
        system_prompt: impl Into<String>,
        allowed_tools: Vec<&'static str>,
        coordinator: Arc<ToolCoordinator>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            producer,
            system_prompt: system_prompt.into(),
            allowed_tools,
            coordinator,
        }
    }

    /// Tools offered to the model on every delegation.
    pub fn allowed_tools(&self) -> &[&'static str] {
        &self.allowed_tools
    }
}

#[async_trait]
impl Agent for ToolWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn producer(&self) -> Producer {
        self.producer
    }

    async fn execute(&self, state: &mut ConversationState) -> Result<()> {
        let messages = prompts::worker_messages(&self.system_prompt, state);
        let result = self
            .coordinator
            .execute(messages, &self.allowed_tools, state.patient_id)
            .await?;

        if result.finish_reason == FinishReason::MaxIterations {
            debug!(worker = %self.name, "worker answered after exhausting tool iterations");
        }

        let mut reply = result.content.trim().to_string();
        if reply.is_empty() {
            // A model that only called tools still leaves the patient an answer.
            reply = result
                .tool_calls
                .iter()
                .rev()
                .find(|call| call.success)
                .map(|call| call.result.clone())
                .unwrap_or_else(|| {
                    warn!(worker = %self.name, "worker produced no reply");
                    NO_ANSWER_REPLY.to_string()
                });
        }

        info!(
            worker = %self.name,
            patient_id = state.patient_id,
            tool_calls = result.tool_calls.len(),
            iterations = result.iterations,
            "worker replied"
        );
        state.push(self.producer, reply);
        Ok(())
    }
}

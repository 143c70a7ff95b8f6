//! Tool-calling loop shared by every leaf worker.
//!
//! 1. Send the conversation with the worker's tool definitions
//! 2. Execute any requested calls, one after another
//! 3. Feed the results back as tool messages
//! 4. Repeat until the model answers in plain text or the iteration cap is hit
//!
//! Tools that take a patient id always receive the id of the patient the
//! request belongs to, whatever the model put in the arguments. Bad arguments
//! and tools outside the worker's set are reported back to the model as tool
//! output so it can correct itself; storage failures abort the loop.

use crate::llm::client::LLMClient;
use crate::tools::registry::ToolRegistry;
use crate::types::{AppError, Result, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for tool calling coordination behavior.
#[derive(Debug, Clone)]
pub struct ToolCallingConfig {
    /// Maximum number of LLM round trips that may request tools.
    pub max_iterations: usize,
}

impl Default for ToolCallingConfig {
    fn default() -> Self {
        Self { max_iterations: 5 }
    }
}

/// Record of a single tool call execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Identifier assigned by the model.
    pub id: String,
    /// Name of the tool that was called.
    pub name: String,
    /// Arguments actually passed to the tool, after patient binding.
    pub arguments: Value,
    /// Text handed back to the model.
    pub result: String,
    /// Whether the tool ran and returned normally.
    pub success: bool,
}

/// Reason why a tool coordination session ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FinishReason {
    /// Model answered without requesting more tools.
    Stop,
    /// Hit the maximum iterations limit.
    MaxIterations,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::MaxIterations => write!(f, "max_iterations"),
        }
    }
}

/// A message in a model conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The text content of the message.
    pub content: String,
    /// Tool calls requested by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool result content (only for Tool role).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Role of a message sender in a model conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl ConversationMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    /// Create an assistant message with optional tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }
}

/// Result of a complete tool coordination session.
#[derive(Debug, Clone)]
pub struct CoordinatorResult {
    /// Final text response from the model.
    pub content: String,
    /// All tool calls made during the session.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of LLM round trips performed.
    pub iterations: usize,
    /// Why the session ended.
    pub finish_reason: FinishReason,
}

/// Runs the tool-calling loop for one worker delegation.
pub struct ToolCoordinator {
    client: Arc<dyn LLMClient>,
    registry: Arc<ToolRegistry>,
    config: ToolCallingConfig,
}

impl ToolCoordinator {
    /// Coordinator over `registry`, calling `client`.
    pub fn new(
        client: Arc<dyn LLMClient>,
        registry: Arc<ToolRegistry>,
        config: ToolCallingConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    /// Run the loop with only `allowed_tools` exposed, acting for `patient_id`.
    pub async fn execute(
        &self,
        mut messages: Vec<ConversationMessage>,
        allowed_tools: &[&str],
        patient_id: i64,
    ) -> Result<CoordinatorResult> {
        let tools = self.registry.definitions_for(allowed_tools);
        let mut records: Vec<ToolCallRecord> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            let response = self
                .client
                .generate_with_tools_and_history(&messages, &tools)
                .await?;

            messages.push(ConversationMessage::assistant(
                &response.content,
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                return Ok(CoordinatorResult {
                    content: response.content,
                    tool_calls: records,
                    iterations: iteration + 1,
                    finish_reason: FinishReason::Stop,
                });
            }

            for call in &response.tool_calls {
                let record = self.execute_single_tool(call, allowed_tools, patient_id).await?;
                messages.push(ConversationMessage::tool_result(&record.id, &record.result));
                records.push(record);
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "tool loop hit its iteration cap, asking for a plain answer"
        );
        let content = self.client.generate_with_history(&messages).await?;

        Ok(CoordinatorResult {
            content,
            tool_calls: records,
            iterations: self.config.max_iterations + 1,
            finish_reason: FinishReason::MaxIterations,
        })
    }

    async fn execute_single_tool(
        &self,
        call: &ToolCall,
        allowed_tools: &[&str],
        patient_id: i64,
    ) -> Result<ToolCallRecord> {
        let tool = match self.registry.get(&call.name) {
            Some(tool) if allowed_tools.contains(&call.name.as_str()) => tool,
            _ => {
                warn!(tool = %call.name, "model requested a tool outside its set");
                return Ok(failed_call(
                    call,
                    call.arguments.clone(),
                    format!("Error: tool '{}' is not available here", call.name),
                ));
            }
        };

        let mut arguments = match &call.arguments {
            Value::Object(_) => call.arguments.clone(),
            Value::String(raw) => {
                warn!(tool = %call.name, "tool arguments are not valid JSON");
                return Ok(failed_call(
                    call,
                    call.arguments.clone(),
                    format!("Error: could not parse arguments as a JSON object: {}", raw),
                ));
            }
            other => {
                warn!(tool = %call.name, "tool arguments are not an object");
                return Ok(failed_call(
                    call,
                    call.arguments.clone(),
                    format!("Error: arguments must be a JSON object, got {}", other),
                ));
            }
        };
        if tool.takes_patient_id() {
            arguments["patient_id"] = Value::from(patient_id);
        }

        debug!(tool = %call.name, args = %arguments, "executing tool");

        match self.registry.execute(&call.name, arguments.clone()).await {
            Ok(value) => Ok(ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments,
                result: match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                },
                success: true,
            }),
            Err(e @ (AppError::InvalidInput(_) | AppError::NotFound(_))) => {
                Ok(failed_call(call, arguments, format!("Error: {}", e)))
            }
            Err(e) => Err(e),
        }
    }
}

fn failed_call(call: &ToolCall, arguments: Value, result: String) -> ToolCallRecord {
    ToolCallRecord {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments,
        result,
        success: false,
    }
}

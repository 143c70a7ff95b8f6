//! Mock implementations for testing.
//!
//! Scripted doubles for the LLM client, the route classifier, the
//! summarizer and the blob store, shared across integration test files.

use async_trait::async_trait;
use medroute::agents::{RouteClassifier, RoutingRequest};
use medroute::llm::{ConversationMessage, LLMClient, LLMResponse, MessageRole, StructuredSchema};
use medroute::memory::{BlobStore, ConversationSummarizer};
use medroute::types::{
    AppError, MemoryUpdate, Producer, Result, RoutingDecision, ToolCall, ToolDefinition,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

/// LLM client that replays queued responses and records what it was sent.
///
/// Tool-calling requests pop from the tool queue; when it runs dry the client
/// answers with `fallback_text` and no tool calls. Structured requests pop from
/// their own queue and fail once it is empty.
#[derive(Default)]
pub struct ScriptedLLMClient {
    tool_responses: Mutex<VecDeque<Result<LLMResponse>>>,
    structured_responses: Mutex<VecDeque<Result<Value>>>,
    fallback_text: String,
    /// Tool names offered on each tool-calling request
    pub offered_tools: Mutex<Vec<Vec<String>>>,
    /// Messages of each tool-calling request
    pub tool_requests: Mutex<Vec<Vec<ConversationMessage>>>,
    /// Number of plain history requests
    pub history_calls: Mutex<usize>,
}

impl ScriptedLLMClient {
    pub fn new() -> Self {
        Self {
            fallback_text: "Done.".to_string(),
            ..Default::default()
        }
    }

    /// Queue a response that calls one tool.
    pub fn then_tool_call(self, name: &str, arguments: Value) -> Self {
        let id = format!("call_{}", self.tool_responses.lock().len());
        self.tool_responses.lock().push_back(Ok(LLMResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id,
                name: name.to_string(),
                arguments,
            }],
            finish_reason: "tool_calls".to_string(),
        }));
        self
    }

    /// Queue a plain text answer.
    pub fn then_text(self, text: &str) -> Self {
        self.tool_responses.lock().push_back(Ok(LLMResponse {
            content: text.to_string(),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
        }));
        self
    }

    /// Queue a failure.
    pub fn then_error(self, error: AppError) -> Self {
        self.tool_responses.lock().push_back(Err(error));
        self
    }

    /// Queue a structured-output value.
    pub fn then_structured(self, value: Value) -> Self {
        self.structured_responses.lock().push_back(Ok(value));
        self
    }

    pub fn tool_request_count(&self) -> usize {
        self.tool_requests.lock().len()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn generate_with_history(&self, _messages: &[ConversationMessage]) -> Result<String> {
        *self.history_calls.lock() += 1;
        Ok(self.fallback_text.clone())
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.tool_requests.lock().push(messages.to_vec());
        self.offered_tools
            .lock()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        self.tool_responses.lock().pop_front().unwrap_or_else(|| {
            Ok(LLMResponse {
                content: self.fallback_text.clone(),
                tool_calls: vec![],
                finish_reason: "stop".to_string(),
            })
        })
    }

    async fn generate_structured(
        &self,
        _messages: &[ConversationMessage],
        _schema: &StructuredSchema,
    ) -> Result<Value> {
        self.structured_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::LLM("no structured response scripted".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// What a classifier was asked.
#[derive(Debug, Clone)]
pub struct RecordedRoute {
    pub supervisor: Producer,
    pub options: Vec<String>,
    pub steps_taken: u32,
    /// System messages sent with the request
    pub system_prompts: Vec<String>,
}

/// Route classifier that replays queued decisions.
///
/// Once the queue is empty it repeats `always`, or fails if none is set.
#[derive(Default)]
pub struct ScriptedClassifier {
    decisions: Mutex<VecDeque<Result<RoutingDecision>>>,
    always: Option<String>,
    /// Every request received, in order
    pub calls: Mutex<Vec<RecordedRoute>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier that returns `label` forever.
    pub fn always(label: &str) -> Self {
        Self {
            always: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn then(self, label: &str) -> Self {
        self.decisions.lock().push_back(Ok(decision(label)));
        self
    }

    pub fn then_error(self, error: AppError) -> Self {
        self.decisions.lock().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn supervisors(&self) -> Vec<Producer> {
        self.calls.lock().iter().map(|c| c.supervisor).collect()
    }
}

pub fn decision(label: &str) -> RoutingDecision {
    RoutingDecision {
        next: label.to_string(),
        reasoning: format!("picked {}", label),
        instructions: format!("handle the request as {}", label),
    }
}

#[async_trait]
impl RouteClassifier for ScriptedClassifier {
    async fn classify(&self, request: &RoutingRequest) -> Result<RoutingDecision> {
        self.calls.lock().push(RecordedRoute {
            supervisor: request.supervisor,
            options: request.options.clone(),
            steps_taken: request.steps_taken,
            system_prompts: request
                .messages
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.content.clone())
                .collect(),
        });

        if let Some(next) = self.decisions.lock().pop_front() {
            return next;
        }
        match &self.always {
            Some(label) => Ok(decision(label)),
            None => Err(AppError::Internal("classifier script exhausted".to_string())),
        }
    }
}

/// Summarizer returning a fixed update.
pub struct StaticSummarizer {
    pub update: MemoryUpdate,
    pub transcripts: Mutex<Vec<String>>,
}

impl StaticSummarizer {
    pub fn new(summary: &str, slots: &[(&str, &str)]) -> Self {
        Self {
            update: MemoryUpdate {
                summary: summary.to_string(),
                slots: slots
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            },
            transcripts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConversationSummarizer for StaticSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<MemoryUpdate> {
        self.transcripts.lock().push(transcript.to_string());
        Ok(self.update.clone())
    }
}

/// Summarizer that always fails.
pub struct FailingSummarizer;

#[async_trait]
impl ConversationSummarizer for FailingSummarizer {
    async fn summarize(&self, _transcript: &str) -> Result<MemoryUpdate> {
        Err(AppError::MalformedDecision("summary was not JSON".to_string()))
    }
}

/// Blob store whose every operation fails.
pub struct UnavailableBlobStore;

#[async_trait]
impl BlobStore for UnavailableBlobStore {
    async fn read_json(&self, _name: &str) -> Result<Option<Value>> {
        Err(AppError::Persistence("blob store offline".to_string()))
    }

    async fn write_json(&self, _name: &str, _value: &Value) -> Result<()> {
        Err(AppError::Persistence("blob store offline".to_string()))
    }
}

//! LLM Client abstractions and provider management
//!
//! Every routing decision, worker reply and memory summary goes through the
//! [`LLMClient`] trait. Two providers are supported, both spoken to through the
//! OpenAI-compatible chat completions protocol:
//! - **OpenAI**: the hosted API or any compatible gateway
//! - **Ollama**: a local server exposing `/v1/chat/completions`

use crate::llm::coordinator::ConversationMessage;
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
///
/// Callers depend on three capabilities: free-text chat, tool calling, and
/// structured output constrained to a JSON schema.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a single completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_history(&[ConversationMessage::user(prompt)])
            .await
    }

    /// Generate with conversation history
    async fn generate_with_history(&self, messages: &[ConversationMessage]) -> Result<String>;

    /// Generate with tool calling support
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;

    /// Generate a JSON value that conforms to `schema`
    ///
    /// Output that is not valid JSON is reported as
    /// [`AppError::MalformedDecision`].
    async fn generate_structured(
        &self,
        messages: &[ConversationMessage],
        schema: &StructuredSchema,
    ) -> Result<Value>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Response from an LLM generation request
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
}

/// Named JSON schema for structured output.
#[derive(Debug, Clone)]
pub struct StructuredSchema {
    /// Schema name, sent to the provider alongside the schema
    pub name: String,
    /// JSON schema document
    pub schema: Value,
}

impl StructuredSchema {
    /// Wrap a hand-written schema document.
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Derive the schema from a type.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
        Self::new(name, schema)
    }
}

/// Sampling and transport settings shared by every provider.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Timeout for one HTTP round trip
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible gateways)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        /// Bearer token
        api_key: String,
        /// Base URL including `/v1`
        api_base: String,
        /// Model name
        model: String,
    },

    /// Ollama local LLM provider
    ///
    /// The model must support tool calling for the workers to function,
    /// e.g. `llama3.1` or `qwen2.5`.
    Ollama {
        /// Server URL without the `/v1` suffix
        base_url: String,
        /// Model tag
        model: String,
    },
}

impl Provider {
    /// Create a client instance for this provider
    pub fn create_client(&self, options: &ClientOptions) -> Result<Arc<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                options,
            )?)),

            Provider::Ollama { base_url, model } => {
                let api_base = format!("{}/v1", base_url.trim_end_matches('/'));
                Ok(Arc::new(super::openai::OpenAIClient::new(
                    String::new(),
                    api_base,
                    model.clone(),
                    options,
                )?))
            }
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    /// Model identifier requested from the provider
    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

/// Turn a provider's structured-output text into JSON.
pub(crate) fn parse_structured(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| {
        AppError::MalformedDecision(format!("structured output is not valid JSON: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_provider_name() {
        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
            model: "gpt-4o-mini".to_string(),
        };
        assert_eq!(openai.name(), "OpenAI");
        assert_eq!(openai.model(), "gpt-4o-mini");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            model: "llama3.1".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
    }

    #[test]
    fn test_ollama_client_uses_v1_base() {
        let provider = Provider::Ollama {
            base_url: "http://localhost:11434/".to_string(),
            model: "llama3.1".to_string(),
        };
        let client = provider.create_client(&ClientOptions::default()).unwrap();
        assert_eq!(client.model_name(), "llama3.1");
    }

    #[test]
    fn test_parse_structured_strips_code_fence() {
        let value = parse_structured("```json\n{\"next\": \"FINISH\"}\n```").unwrap();
        assert_eq!(value["next"], "FINISH");
    }

    #[test]
    fn test_parse_structured_rejects_prose() {
        let err = parse_structured("I think we should finish").unwrap_err();
        assert!(matches!(err, AppError::MalformedDecision(_)));
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Sample {
        summary: String,
    }

    #[test]
    fn test_schema_for_type_lists_properties() {
        let schema = StructuredSchema::for_type::<Sample>("sample");
        assert_eq!(schema.name, "sample");
        assert!(schema.schema["properties"]["summary"].is_object());
    }
}

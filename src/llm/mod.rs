//! Language model integration.
//!
//! - [`client`] - the [`LLMClient`] capability trait and provider selection
//! - [`openai`] - HTTP client for OpenAI-compatible chat completion endpoints
//! - [`coordinator`] - the multi-turn tool-calling loop used by leaf workers

pub mod client;
pub mod coordinator;
/// OpenAI-compatible chat completions client.
pub mod openai;

pub use client::{ClientOptions, LLMClient, LLMResponse, Provider, StructuredSchema};
pub use coordinator::{
    ConversationMessage, CoordinatorResult, FinishReason, MessageRole, ToolCallRecord,
    ToolCallingConfig, ToolCoordinator,
};
pub use openai::OpenAIClient;

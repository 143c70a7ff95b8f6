use crate::{
    llm::{ConversationMessage, LLMClient, StructuredSchema},
    types::{AppError, Producer, Result, RoutingDecision},
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Route label that ends a supervisor's loop.
pub const FINISH: &str = "FINISH";

/// Everything a classifier sees for one routing call.
#[derive(Debug, Clone)]
pub struct RoutingRequest {
    /// Supervisor asking for the decision
    pub supervisor: Producer,
    /// Allowed labels, `FINISH` included
    pub options: Vec<String>,
    /// Prompt plus conversation log
    pub messages: Vec<ConversationMessage>,
    /// Routing calls already made in this turn
    pub steps_taken: u32,
}

/// Picks the next route for a supervisor.
///
/// Implementations return whatever label they produced; the supervisor is
/// responsible for rejecting labels outside `options`.
#[async_trait]
pub trait RouteClassifier: Send + Sync {
    /// Produce a decision for `request`.
    async fn classify(&self, request: &RoutingRequest) -> Result<RoutingDecision>;
}

/// Classifier backed by structured LLM output.
pub struct LLMRouteClassifier {
    llm: Arc<dyn LLMClient>,
}

impl LLMRouteClassifier {
    /// Classifier calling `llm`.
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// Schema constraining `next` to the request's options.
    fn decision_schema(options: &[String]) -> StructuredSchema {
        StructuredSchema::new(
            "routing_decision",
            json!({
                "type": "object",
                "properties": {
                    "next": {
                        "type": "string",
                        "enum": options,
                        "description": "The agent to act next, or FINISH"
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "Why this route was chosen"
                    },
                    "instructions": {
                        "type": "string",
                        "description": "What the chosen agent should do"
                    }
                },
                "required": ["next", "reasoning", "instructions"],
                "additionalProperties": false
            }),
        )
    }
}

#[async_trait]
impl RouteClassifier for LLMRouteClassifier {
    async fn classify(&self, request: &RoutingRequest) -> Result<RoutingDecision> {
        let schema = Self::decision_schema(&request.options);
        let value = self
            .llm
            .generate_structured(&request.messages, &schema)
            .await?;

        serde_json::from_value(value).map_err(|e| {
            AppError::MalformedDecision(format!(
                "{} returned an unusable routing decision: {}",
                request.supervisor, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_restricts_next_to_options() {
        let options = vec!["doctor_agent".to_string(), FINISH.to_string()];
        let schema = LLMRouteClassifier::decision_schema(&options);

        assert_eq!(schema.name, "routing_decision");
        assert_eq!(
            schema.schema["properties"]["next"]["enum"],
            json!(["doctor_agent", "FINISH"])
        );
        assert_eq!(schema.schema["additionalProperties"], json!(false));
    }
}

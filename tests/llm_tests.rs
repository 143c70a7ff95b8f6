//! LLM client tests against a mock chat completions server
//!
//! These tests verify the OpenAI-compatible wire format, the routing
//! classifier and the summarizer without a real model.

use medroute::agents::{LLMRouteClassifier, RouteClassifier, RoutingRequest};
use medroute::llm::{ClientOptions, ConversationMessage, LLMClient, Provider, StructuredSchema};
use medroute::memory::{ConversationSummarizer, LLMSummarizer};
use medroute::types::{AppError, Producer, ToolDefinition};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_client(server: &MockServer) -> Arc<dyn LLMClient> {
    Provider::OpenAI {
        api_key: "sk-test".to_string(),
        api_base: format!("{}/v1", server.uri()),
        model: "gpt-4o-mini".to_string(),
    }
    .create_client(&ClientOptions::default())
    .unwrap()
}

fn completion(message: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": "stop"
        }]
    }))
}

#[tokio::test]
async fn test_plain_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "temperature": 0.0})))
        .respond_with(completion(json!({"role": "assistant", "content": "Hello there"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let reply = client.generate("hi").await.unwrap();
    assert_eq!(reply, "Hello there");
    assert_eq!(client.model_name(), "gpt-4o-mini");
}

#[tokio::test]
async fn test_tool_calls_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {
                    "name": "check_availability_by_doctor",
                    "arguments": "{\"doctor_name\":\"sarah wilson\",\"date\":\"18-12-2024\"}"
                }
            }]
        })))
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let tools = vec![ToolDefinition {
        name: "check_availability_by_doctor".to_string(),
        description: "availability".to_string(),
        parameters: json!({"type": "object", "properties": {}}),
    }];
    let response = client
        .generate_with_tools_and_history(&[ConversationMessage::user("is she free?")], &tools)
        .await
        .unwrap();

    assert!(response.content.is_empty());
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_1");
    assert_eq!(response.tool_calls[0].arguments["doctor_name"], "sarah wilson");
}

#[tokio::test]
async fn test_unparseable_tool_arguments_are_kept_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "set_appointment",
                        "arguments": "{\"doctor_name\": \"john doe\""
                    }
                },
                {
                    "id": "call_2",
                    "type": "function",
                    "function": { "name": "check_lab_availability", "arguments": "" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let response = client
        .generate_with_tools_and_history(&[ConversationMessage::user("book dr doe")], &[])
        .await
        .unwrap();

    assert_eq!(response.tool_calls.len(), 2);
    assert_eq!(
        response.tool_calls[0].arguments,
        json!("{\"doctor_name\": \"john doe\"")
    );
    assert_eq!(response.tool_calls[1].arguments, json!({}));
}

#[tokio::test]
async fn test_structured_output_requests_json_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"name": "answer"}}
        })))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": "```json\n{\"value\": 3}\n```"
        })))
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let value = client
        .generate_structured(
            &[ConversationMessage::user("three")],
            &StructuredSchema::new("answer", json!({"type": "object"})),
        )
        .await
        .unwrap();
    assert_eq!(value, json!({"value": 3}));
}

#[tokio::test]
async fn test_error_status_is_llm_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = openai_client(&server).generate("hi").await.unwrap_err();
    match err {
        AppError::LLM(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("rate limited"));
        }
        other => panic!("expected LLM error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ollama_uses_v1_without_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({"role": "assistant", "content": "local"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Provider::Ollama {
        base_url: format!("{}/", server.uri()),
        model: "qwen2.5:7b".to_string(),
    }
    .create_client(&ClientOptions::default())
    .unwrap();

    assert_eq!(client.generate("hi").await.unwrap(), "local");
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_route_classifier_parses_decision() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "response_format": {"json_schema": {"schema": {"properties": {"next": {"enum": ["doctor_agent", "lab_agent", "FINISH"]}}}}}
        })))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": "{\"next\": \"lab_agent\", \"reasoning\": \"lab question\", \"instructions\": \"list slots\"}"
        })))
        .mount(&server)
        .await;

    let classifier = LLMRouteClassifier::new(openai_client(&server));
    let decision = classifier
        .classify(&RoutingRequest {
            supervisor: Producer::TopSupervisor,
            options: vec![
                "doctor_agent".to_string(),
                "lab_agent".to_string(),
                "FINISH".to_string(),
            ],
            messages: vec![ConversationMessage::user("any lab slots friday?")],
            steps_taken: 0,
        })
        .await
        .unwrap();

    assert_eq!(decision.next, "lab_agent");
    assert_eq!(decision.instructions, "list slots");
}

#[tokio::test]
async fn test_route_classifier_rejects_non_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(json!({"role": "assistant", "content": "lab_agent"})))
        .mount(&server)
        .await;

    let classifier = LLMRouteClassifier::new(openai_client(&server));
    let err = classifier
        .classify(&RoutingRequest {
            supervisor: Producer::TopSupervisor,
            options: vec!["lab_agent".to_string(), "FINISH".to_string()],
            messages: vec![ConversationMessage::user("hi")],
            steps_taken: 0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MalformedDecision(_)));
}

#[tokio::test]
async fn test_summarizer_returns_update() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": "{\"summary\": \"Booked Dr. Wilson\", \"slots\": {\"preferred_doctor\": \"sarah wilson\"}}"
        })))
        .mount(&server)
        .await;

    let summarizer = LLMSummarizer::new(openai_client(&server));
    let update = summarizer.summarize("USER: book dr wilson").await.unwrap();
    assert_eq!(update.summary, "Booked Dr. Wilson");
    assert_eq!(
        update.slots.get("preferred_doctor").map(String::as_str),
        Some("sarah wilson")
    );
}

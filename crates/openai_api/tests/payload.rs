use openai_api::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, OpenAiApiClient, OpenAiApiConfig,
    OpenAiApiError,
};
use serde_json::{json, Value};

fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", "be brief"),
        ChatMessage::new("user", "hi"),
    ]
}

#[test]
fn payload_serialization_defaults_omit_optional_fields() {
    let request = ChatCompletionRequest::new("gpt-4o-mini", conversation());
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(body["model"], Value::String("gpt-4o-mini".to_string()));
    assert_eq!(body["stream"], Value::Bool(false));
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hi"},
        ])
    );
    assert!(body.get("temperature").is_none());
    assert!(body.get("user").is_none());
}

#[test]
fn payload_serialization_includes_optional_fields_when_set() {
    let mut request = ChatCompletionRequest::new("gpt-4o", conversation()).streaming(true);
    request.temperature = Some(0.2);
    request.user = Some("cli".to_string());

    let body = serde_json::to_value(&request).expect("serialize payload");
    assert_eq!(body["stream"], Value::Bool(true));
    assert_eq!(body["temperature"], json!(0.2));
    assert_eq!(body["user"], Value::String("cli".to_string()));
}

#[test]
fn response_deserialization_reads_first_message_and_usage() {
    let body = r#"{
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}
        ],
        "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
    }"#;

    let response: ChatCompletionResponse = serde_json::from_str(body).expect("parse response");
    let message = response.first_message().expect("message");
    assert_eq!(message, &ChatMessage::new("assistant", "Hello!"));
    assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(11));
}

#[test]
fn build_request_targets_normalized_endpoint() {
    let config = OpenAiApiConfig::new("sk-test").with_base_url("https://api.openai.com/v1/");
    let client = OpenAiApiClient::new(config).expect("client");
    assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");

    let request = ChatCompletionRequest::new("gpt-4", conversation()).streaming(true);
    let http_request = client
        .build_request(&request)
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(http_request.method(), reqwest::Method::POST);
    assert_eq!(
        http_request.url().as_str(),
        "https://api.openai.com/v1/chat/completions"
    );
    assert_eq!(
        http_request
            .headers()
            .get("accept")
            .and_then(|value| value.to_str().ok()),
        Some("text/event-stream")
    );

    let body = request_body_json(&http_request);
    assert_eq!(body["stream"], Value::Bool(true));
    assert_eq!(body["messages"][1]["content"], Value::String("hi".to_string()));
}

#[test]
fn client_rejects_invalid_base_url() {
    let config = OpenAiApiConfig::new("sk-test").with_base_url("not a url");
    assert!(matches!(
        OpenAiApiClient::new(config),
        Err(OpenAiApiError::InvalidBaseUrl(_))
    ));
}

#[test]
fn build_request_requires_api_key() {
    let client = OpenAiApiClient::new(OpenAiApiConfig::default()).expect("client");
    let request = ChatCompletionRequest::new("gpt-4", conversation());

    assert!(matches!(
        client.build_request(&request),
        Err(OpenAiApiError::MissingApiKey)
    ));
}

fn request_body_json(request: &reqwest::Request) -> Value {
    let body = request
        .body()
        .expect("request should carry JSON body")
        .as_bytes()
        .expect("JSON body should be buffered bytes");
    serde_json::from_slice::<Value>(body).expect("request body should be valid JSON")
}

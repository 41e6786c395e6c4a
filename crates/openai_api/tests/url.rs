use openai_api::url::DEFAULT_OPENAI_BASE_URL;
use openai_api::{normalize_chat_completions_url, OpenAiApiError};

#[test]
fn url_normalization_keeps_existing_chat_completions_endpoint() {
    assert_eq!(
        normalize_chat_completions_url("https://api.openai.com/v1/chat/completions")
            .expect("valid url"),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn url_normalization_appends_completions_to_chat_base() {
    assert_eq!(
        normalize_chat_completions_url("http://localhost:8080/v1/chat/").expect("valid url"),
        "http://localhost:8080/v1/chat/completions"
    );
}

#[test]
fn url_normalization_appends_chat_completions_to_generic_base() {
    assert_eq!(
        normalize_chat_completions_url("https://proxy.example.com/openai/v1").expect("valid url"),
        "https://proxy.example.com/openai/v1/chat/completions"
    );
}

#[test]
fn url_normalization_defaults_blank_input() {
    assert_eq!(
        normalize_chat_completions_url("   ").expect("default url"),
        format!("{DEFAULT_OPENAI_BASE_URL}/chat/completions")
    );
}

#[test]
fn url_normalization_rejects_relative_and_non_http_urls() {
    assert!(matches!(
        normalize_chat_completions_url("api.openai.com/v1"),
        Err(OpenAiApiError::InvalidBaseUrl(_))
    ));
    assert!(matches!(
        normalize_chat_completions_url("ftp://api.openai.com/v1"),
        Err(OpenAiApiError::InvalidBaseUrl(_))
    ));
}

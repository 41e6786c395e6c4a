use url::Url;

use crate::error::OpenAiApiError;

/// Default base URL for OpenAI API requests.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Normalize a base URL to the chat-completions endpoint.
///
/// Normalization rules:
/// 1) keep `/chat/completions` unchanged
/// 2) append `/completions` when path ends in `/chat`
/// 3) append `/chat/completions` otherwise
///
/// Blank input selects [`DEFAULT_OPENAI_BASE_URL`]; anything that is not an
/// absolute http(s) URL is rejected.
pub fn normalize_chat_completions_url(input: &str) -> Result<String, OpenAiApiError> {
    let base = if input.trim().is_empty() {
        DEFAULT_OPENAI_BASE_URL
    } else {
        input.trim()
    };

    let parsed =
        Url::parse(base).map_err(|error| OpenAiApiError::InvalidBaseUrl(format!("{base}: {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OpenAiApiError::InvalidBaseUrl(format!(
            "{base}: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        return Ok(trimmed.to_string());
    }
    if trimmed.ends_with("/chat") {
        return Ok(format!("{trimmed}/completions"));
    }
    Ok(format!("{trimmed}/chat/completions"))
}

//! Transport-only OpenAI chat-completions client primitives.
//!
//! This crate owns request building, response parsing, and server-sent event
//! framing for the `/chat/completions` endpoint only. It has no notion of a
//! conversation, token accounting, or terminal output.
//!
//! There is no retry policy: a failed request is reported to the caller as-is.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{ChatCompletionStream, OpenAiApiClient};
pub use config::OpenAiApiConfig;
pub use error::OpenAiApiError;
pub use events::{ChatCompletionChunk, ChunkChoice, ChunkDelta, StreamEvent};
pub use payload::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseChoice};
pub use sse::SseStreamParser;
pub use url::normalize_chat_completions_url;

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::config::OpenAiApiConfig;
use crate::error::{parse_error_message, OpenAiApiError};
use crate::events::StreamEvent;
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::payload::{ChatCompletionRequest, ChatCompletionResponse};
use crate::sse::SseStreamParser;
use crate::url::normalize_chat_completions_url;

#[derive(Debug)]
pub struct OpenAiApiClient {
    http: Client,
    config: OpenAiApiConfig,
    endpoint: String,
}

impl OpenAiApiClient {
    pub fn new(config: OpenAiApiConfig) -> Result<Self, OpenAiApiError> {
        let endpoint = normalize_chat_completions_url(&config.base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(OpenAiApiError::from)?;
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    pub fn config(&self) -> &OpenAiApiConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_headers(&self, accept: &str) -> Result<HeaderMap, OpenAiApiError> {
        let headers = build_headers(&self.config, accept)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| OpenAiApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    OpenAiApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::RequestBuilder, OpenAiApiError> {
        let accept = if request.stream {
            ACCEPT_EVENT_STREAM
        } else {
            ACCEPT_JSON
        };
        let headers = self.build_headers(accept)?;
        Ok(self.http.post(&self.endpoint).headers(headers).json(request))
    }

    /// Sends the request once and fails on any non-success status.
    pub async fn send(&self, request: &ChatCompletionRequest) -> Result<Response, OpenAiApiError> {
        let response = self.build_request(request)?.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        Err(OpenAiApiError::Status(status, parse_error_message(status, &body)))
    }

    /// Requests a single, non-streamed completion.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiApiError> {
        let request = request.clone().streaming(false);
        let response = self.send(&request).await?;
        let body = response.bytes().await?;
        let parsed = serde_json::from_slice::<ChatCompletionResponse>(&body)?;
        if parsed.choices.is_empty() {
            return Err(OpenAiApiError::EmptyResponse);
        }
        Ok(parsed)
    }

    /// Opens a streamed completion; events are pulled with [`ChatCompletionStream::next_event`].
    pub async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionStream, OpenAiApiError> {
        let request = request.clone().streaming(true);
        let response = self.send(&request).await?;
        Ok(ChatCompletionStream::new(response.bytes_stream().boxed()))
    }
}

/// Pull-based view over one streamed response body.
pub struct ChatCompletionStream {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: SseStreamParser,
    pending: VecDeque<Result<StreamEvent, OpenAiApiError>>,
    finished: bool,
}

impl ChatCompletionStream {
    fn new(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            bytes,
            parser: SseStreamParser::default(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Returns the next event in arrival order, or `None` once the stream is over.
    ///
    /// `[DONE]` is yielded once and ends the stream; anything after it is discarded.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, OpenAiApiError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if matches!(event, Ok(StreamEvent::Done)) {
                    self.pending.clear();
                    self.finished = true;
                }
                return Some(event);
            }

            if self.finished {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.parser.feed(&chunk)),
                Some(Err(error)) => {
                    self.finished = true;
                    return Some(Err(OpenAiApiError::from(error)));
                }
                None => {
                    self.finished = true;
                    self.pending.extend(self.parser.finish());
                }
            }
        }
    }
}

impl std::fmt::Debug for ChatCompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionStream")
            .field("parser", &self.parser)
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish()
    }
}

//! OpenAI-backed implementation of the shared `chat_provider` contract.
//!
//! This adapter drives the async `openai_api` client from synchronous code:
//! it owns a current-thread tokio runtime and blocks on each next chunk, so
//! callers see a plain pull-based iterator of fragments.

use std::sync::Arc;
use std::time::Duration;

use chat_provider::{
    CompletionRequest, CompletionService, Fragment, FragmentStream, Message, ProviderInitError,
    Role, Tokenizer, TransportError,
};
use openai_api::{
    ChatCompletionRequest, ChatCompletionStream, ChatMessage, ChunkDelta, OpenAiApiClient,
    OpenAiApiConfig, OpenAiApiError, StreamEvent,
};
use tiktoken_rs::CoreBPE;
use tokio::runtime::Runtime;

/// Stable provider identifier used for explicit startup selection.
pub const OPENAI_PROVIDER_ID: &str = "openai";

/// Runtime configuration for the OpenAI provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub timeout: Option<Duration>,
}

impl OpenAiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            organization: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_openai_api_config(self) -> OpenAiApiConfig {
        let mut config = OpenAiApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(organization) = self.organization {
            config = config.with_organization(organization);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

type DeltaStream<'a> = Box<dyn Iterator<Item = Result<ChunkDelta, OpenAiApiError>> + 'a>;

trait ChunkSource: Send + Sync {
    fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatMessage, OpenAiApiError>;

    fn stream(&self, request: &ChatCompletionRequest) -> Result<DeltaStream<'_>, OpenAiApiError>;
}

#[derive(Debug)]
struct DefaultChunkSource {
    client: OpenAiApiClient,
    runtime: Runtime,
}

impl DefaultChunkSource {
    fn new(client: OpenAiApiClient) -> Result<Self, ProviderInitError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ProviderInitError::new(format!("failed to initialize tokio runtime: {error}"))
            })?;

        Ok(Self { client, runtime })
    }
}

impl ChunkSource for DefaultChunkSource {
    fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatMessage, OpenAiApiError> {
        let response = self.runtime.block_on(self.client.complete(request))?;
        response
            .first_message()
            .cloned()
            .ok_or(OpenAiApiError::EmptyResponse)
    }

    fn stream(&self, request: &ChatCompletionRequest) -> Result<DeltaStream<'_>, OpenAiApiError> {
        let inner = self.runtime.block_on(self.client.open_stream(request))?;
        Ok(Box::new(BlockingDeltas {
            runtime: &self.runtime,
            inner,
            done: false,
        }))
    }
}

/// Blocks on the runtime once per `next`; chunks without a choice are skipped.
struct BlockingDeltas<'a> {
    runtime: &'a Runtime,
    inner: ChatCompletionStream,
    done: bool,
}

impl Iterator for BlockingDeltas<'_> {
    type Item = Result<ChunkDelta, OpenAiApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.runtime.block_on(self.inner.next_event()) {
                Some(Ok(StreamEvent::Chunk(chunk))) => {
                    if let Some(delta) = chunk.first_delta() {
                        return Some(Ok(delta.clone()));
                    }
                }
                Some(Ok(StreamEvent::Done)) | None => self.done = true,
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }
        None
    }
}

/// `CompletionService` adapter backed by `openai_api` transport primitives.
pub struct OpenAiCompletionService {
    source: Arc<dyn ChunkSource>,
}

impl OpenAiCompletionService {
    /// Creates a service using real OpenAI transport.
    ///
    /// Fails when the API key is blank or the base URL is invalid.
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderInitError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderInitError::new(
                "an API key is required for the openai provider (set `apikey` in the config file or pass --apikey)",
            ));
        }

        let client =
            OpenAiApiClient::new(config.into_openai_api_config()).map_err(map_init_error)?;
        tracing::debug!(endpoint = client.endpoint(), "openai provider ready");

        Ok(Self {
            source: Arc::new(DefaultChunkSource::new(client)?),
        })
    }

    #[cfg(test)]
    fn with_chunk_source_for_tests(source: Arc<dyn ChunkSource>) -> Self {
        Self { source }
    }
}

impl CompletionService for OpenAiCompletionService {
    fn provider_id(&self) -> &str {
        OPENAI_PROVIDER_ID
    }

    fn complete(&self, request: CompletionRequest) -> Result<Message, TransportError> {
        let request = to_wire_request(request);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "requesting chat completion"
        );

        let message = self.source.complete(&request).map_err(TransportError::new)?;
        Ok(Message::new(
            parse_role(&message.role).unwrap_or(Role::Assistant),
            message.content,
        ))
    }

    fn stream(&self, request: CompletionRequest) -> Result<FragmentStream<'_>, TransportError> {
        let request = to_wire_request(request);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "opening chat completion stream"
        );

        let deltas = self.source.stream(&request).map_err(TransportError::new)?;
        Ok(Box::new(deltas.map(|delta| {
            delta.map(to_fragment).map_err(TransportError::new)
        })))
    }
}

/// Counts tokens with the BPE encoding registered for a model.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Resolves the model's encoding, falling back to `cl100k_base` for
    /// models tiktoken does not know.
    pub fn for_model(model: &str) -> Result<Self, ProviderInitError> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => {
                tracing::debug!(model, "no tiktoken encoding for model, using cl100k_base");
                tiktoken_rs::cl100k_base().map_err(|error| {
                    ProviderInitError::new(format!("failed to load cl100k_base encoding: {error}"))
                })?
            }
        };

        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer").finish_non_exhaustive()
    }
}

fn to_wire_request(request: CompletionRequest) -> ChatCompletionRequest {
    let messages = request
        .messages
        .into_iter()
        .map(|message| ChatMessage::new(message.role.as_str(), message.content))
        .collect();
    ChatCompletionRequest::new(request.model, messages)
}

fn to_fragment(delta: ChunkDelta) -> Fragment {
    Fragment {
        role: delta.role.as_deref().and_then(parse_role),
        content: delta.content,
    }
}

fn parse_role(value: &str) -> Option<Role> {
    match value.parse() {
        Ok(role) => Some(role),
        Err(error) => {
            tracing::debug!(%error, "ignoring role the client does not model");
            None
        }
    }
}

fn map_init_error(error: OpenAiApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize openai provider: {error}"))
}

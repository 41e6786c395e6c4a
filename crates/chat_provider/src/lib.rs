//! Minimal provider-agnostic contract for chat completions and token counting.
//!
//! This crate defines only the message model, the streamed fragment shape, and
//! the two capabilities a conversation needs from the outside world: a
//! completion service and a tokenizer. It excludes transport details, wire
//! payloads, and conversation bookkeeping.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned while constructing/configuring a provider before any request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure reported by a completion service while a request is in flight.
///
/// The transport's own error is carried as the source and rendered verbatim.
#[derive(Debug)]
pub struct TransportError {
    source: Box<dyn Error + Send + Sync + 'static>,
}

impl TransportError {
    #[must_use]
    pub fn new(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Returns the transport error this value wraps.
    #[must_use]
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.source()
    }
}

/// Author of one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Provider-neutral chat message, also the on-disk record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One incremental piece of a streamed completion.
///
/// Services announce the role once, early, and then send content pieces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub role: Option<Role>,
    pub content: Option<String>,
}

impl Fragment {
    #[must_use]
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            content: None,
        }
    }

    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
        }
    }
}

/// Input required to request one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// Lazy, finite, non-restartable sequence of fragments for one request.
pub type FragmentStream<'a> = Box<dyn Iterator<Item = Result<Fragment, TransportError>> + 'a>;

/// Completion service interface.
pub trait CompletionService {
    /// Returns a stable identifier for diagnostics.
    fn provider_id(&self) -> &str;

    /// Requests one completion and returns it as a single message.
    ///
    /// The default drains [`CompletionService::stream`] through [`assemble`].
    fn complete(&self, request: CompletionRequest) -> Result<Message, TransportError> {
        assemble(self.stream(request)?, &mut |_| {})
    }

    /// Requests one completion and returns its fragments in arrival order.
    ///
    /// The returned iterator blocks on each `next` until the next fragment
    /// arrives and ends when the service signals completion.
    fn stream(&self, request: CompletionRequest) -> Result<FragmentStream<'_>, TransportError>;
}

/// Reassembles a fragment stream into one message.
///
/// The role comes from the first fragment that carries one (assistant when
/// none does). Content pieces are concatenated in arrival order, and each
/// piece is handed to `on_content` before it is accumulated. The first
/// transport error aborts reassembly.
pub fn assemble(
    fragments: impl IntoIterator<Item = Result<Fragment, TransportError>>,
    on_content: &mut dyn FnMut(&str),
) -> Result<Message, TransportError> {
    let mut role = None;
    let mut content = String::new();

    for fragment in fragments {
        let fragment = fragment?;
        if role.is_none() {
            role = fragment.role;
        }
        if let Some(piece) = fragment.content {
            on_content(&piece);
            content.push_str(&piece);
        }
    }

    Ok(Message::new(role.unwrap_or(Role::Assistant), content))
}

/// Model-specific text-to-token-count function.
pub trait Tokenizer {
    fn count(&self, text: &str) -> usize;
}

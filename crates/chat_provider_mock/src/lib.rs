//! Deterministic mock implementation of the shared `chat_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chat_provider::{
    assemble, CompletionRequest, CompletionService, Fragment, FragmentStream, Message, Role,
    Tokenizer, TransportError,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One scripted answer, consumed by the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Announces the assistant role, then streams the text split at spaces and newlines.
    Text(String),
    /// Streams exactly these fragments.
    Fragments(Vec<Fragment>),
    /// Fails before any fragment is produced.
    Fail(String),
    /// Streams the fragments, then fails.
    FailMidStream {
        fragments: Vec<Fragment>,
        error: String,
    },
}

impl MockReply {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Scripted completion service used by tests and offline runs.
///
/// Replies are served in FIFO order; once the script is exhausted every
/// request gets the fallback reply. Every request is recorded for inspection.
#[derive(Debug)]
pub struct MockCompletionService {
    script: Mutex<VecDeque<MockReply>>,
    fallback: String,
    token_delay: Duration,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionService {
    /// Creates a service that answers with the given replies in order.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: DEFAULT_REPLY.to_string(),
            token_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Pauses between streamed fragments so terminal output looks live.
    #[must_use]
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Returns every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn next_reply(&self, request: CompletionRequest) -> MockReply {
        lock_unpoisoned(&self.requests).push(request);
        lock_unpoisoned(&self.script)
            .pop_front()
            .unwrap_or_else(|| MockReply::Text(self.fallback.clone()))
    }
}

impl Default for MockCompletionService {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

const DEFAULT_REPLY: &str = "This is a mocked reply.\n\
Here is a snippet you can grab with `.copy`:\n\
```rust\n\
fn main() {\n    println!(\"Hello from the mock provider\");\n}\n\
```\n\
Completed.";

impl CompletionService for MockCompletionService {
    fn provider_id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    fn complete(&self, request: CompletionRequest) -> Result<Message, TransportError> {
        match self.next_reply(request) {
            MockReply::Text(text) => Ok(Message::assistant(text)),
            MockReply::Fragments(fragments) => {
                assemble(fragments.into_iter().map(Ok), &mut |_| {})
            }
            MockReply::Fail(error) | MockReply::FailMidStream { error, .. } => {
                Err(TransportError::new(error))
            }
        }
    }

    fn stream(&self, request: CompletionRequest) -> Result<FragmentStream<'_>, TransportError> {
        let items: Vec<Result<Fragment, TransportError>> = match self.next_reply(request) {
            MockReply::Text(text) => std::iter::once(Fragment::role(Role::Assistant))
                .chain(split_tokens(&text).into_iter().map(Fragment::content))
                .map(Ok)
                .collect(),
            MockReply::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
            MockReply::Fail(error) => return Err(TransportError::new(error)),
            MockReply::FailMidStream { fragments, error } => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(TransportError::new(error))))
                .collect(),
        };

        let delay = self.token_delay;
        Ok(Box::new(items.into_iter().inspect(move |_| {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        })))
    }
}

/// Counts whitespace-separated words; stands in for a model tokenizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending_token = String::new();

    for ch in text.chars() {
        pending_token.push(ch);

        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending_token));
        }
    }

    if !pending_token.is_empty() {
        tokens.push(pending_token);
    }

    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

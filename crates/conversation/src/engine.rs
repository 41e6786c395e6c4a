use std::path::PathBuf;
use std::sync::Arc;

use chat_provider::{assemble, CompletionRequest, CompletionService, Message, Role, Tokenizer};
use conversation_store::ConversationStore;
use uuid::Uuid;

use crate::code_block::extract_code_block;
use crate::error::ConversationError;
use crate::token_limit::token_limit_for_model;

/// One dialogue: its history, token accounting, and the services that drive it.
///
/// `token_count` always equals the sum of the tokenizer's count over every
/// message's content.
pub struct Conversation {
    id: Uuid,
    model: String,
    messages: Vec<Message>,
    token_count: usize,
    token_limit: Option<usize>,
    streaming: bool,
    store: ConversationStore,
    service: Arc<dyn CompletionService>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Conversation {
    /// Starts an empty conversation with a fresh time-ordered id.
    pub fn new(
        model: impl Into<String>,
        service: Arc<dyn CompletionService>,
        tokenizer: Arc<dyn Tokenizer>,
        store: ConversationStore,
    ) -> Result<Self, ConversationError> {
        Self::restore(model, service, tokenizer, store, Uuid::now_v7(), Vec::new())
    }

    /// Rebuilds a conversation from an existing id and history.
    pub fn restore(
        model: impl Into<String>,
        service: Arc<dyn CompletionService>,
        tokenizer: Arc<dyn Tokenizer>,
        store: ConversationStore,
        id: Uuid,
        messages: Vec<Message>,
    ) -> Result<Self, ConversationError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ConversationError::Configuration(
                "a model identifier is required".to_string(),
            ));
        }

        let token_count = messages
            .iter()
            .map(|message| tokenizer.count(&message.content))
            .sum();
        let token_limit = token_limit_for_model(&model);

        tracing::debug!(
            %id,
            %model,
            messages = messages.len(),
            token_count,
            ?token_limit,
            "conversation ready"
        );
        Ok(Self {
            id,
            model,
            messages,
            token_count,
            token_limit,
            streaming: true,
            store,
            service,
            tokenizer,
        })
    }

    /// Resumes the most recently modified conversation in `store`.
    pub fn load_latest(
        model: impl Into<String>,
        service: Arc<dyn CompletionService>,
        tokenizer: Arc<dyn Tokenizer>,
        store: ConversationStore,
    ) -> Result<Self, ConversationError> {
        let stored = store.latest()?;
        Self::restore(model, service, tokenizer, store, stored.id, stored.messages)
    }

    /// When disabled, replies are requested in one piece instead of streamed.
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Appends a user message and requests the reply.
    ///
    /// The user message stays in history even if the request then fails.
    pub fn add_user_message(
        &mut self,
        text: impl Into<String>,
        on_content: &mut dyn FnMut(&str),
    ) -> Result<&Message, ConversationError> {
        self.push(Message::user(text));
        self.request_completion(on_content)
    }

    /// Requests a reply to the current history and appends it.
    ///
    /// Each content piece is passed to `on_content` as it arrives. Nothing is
    /// appended when the service fails.
    pub fn request_completion(
        &mut self,
        on_content: &mut dyn FnMut(&str),
    ) -> Result<&Message, ConversationError> {
        let reply = self.fetch_reply(on_content)?;
        Ok(self.push(reply))
    }

    /// Drops the last assistant reply and requests a new one.
    ///
    /// If the new request fails the dropped reply is put back, so history and
    /// token count are as they were before the call.
    pub fn redo(
        &mut self,
        on_content: &mut dyn FnMut(&str),
    ) -> Result<&Message, ConversationError> {
        match self.messages.last() {
            None => return Err(ConversationError::EmptyHistory),
            Some(message) if message.role != Role::Assistant => {
                return Err(ConversationError::NoAssistantReply)
            }
            Some(_) => {}
        }

        let Some(removed) = self.messages.pop() else {
            return Err(ConversationError::EmptyHistory);
        };
        self.token_count = self
            .token_count
            .saturating_sub(self.tokenizer.count(&removed.content));

        match self.fetch_reply(on_content) {
            Ok(reply) => Ok(self.push(reply)),
            Err(error) => {
                tracing::debug!(id = %self.id, %error, "redo failed, keeping previous reply");
                self.push(removed);
                Err(error)
            }
        }
    }

    /// The first fenced code block in the most recent message.
    #[must_use]
    pub fn extract_code_block(&self) -> Option<String> {
        self.last_message()
            .and_then(|message| extract_code_block(&message.content))
    }

    /// Writes the history to [`Conversation::filename`].
    ///
    /// Returns `None` without touching the disk when there is nothing to save.
    pub fn save(&self) -> Result<Option<PathBuf>, ConversationError> {
        if self.messages.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.store.save(&self.id, &self.messages)?))
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    #[must_use]
    pub fn token_limit(&self) -> Option<usize> {
        self.token_limit
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    #[must_use]
    pub fn filename(&self) -> PathBuf {
        self.store.path_for(&self.id)
    }

    fn fetch_reply(&self, on_content: &mut dyn FnMut(&str)) -> Result<Message, ConversationError> {
        let request = CompletionRequest::new(self.model.clone(), self.messages.clone());
        tracing::debug!(
            id = %self.id,
            provider = self.service.provider_id(),
            messages = request.messages.len(),
            streaming = self.streaming,
            "requesting completion"
        );

        if self.streaming {
            Ok(assemble(self.service.stream(request)?, on_content)?)
        } else {
            let reply = self.service.complete(request)?;
            on_content(&reply.content);
            Ok(reply)
        }
    }

    fn push(&mut self, message: Message) -> &Message {
        self.token_count += self.tokenizer.count(&message.content);
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("token_count", &self.token_count)
            .field("token_limit", &self.token_limit)
            .field("provider", &self.service.provider_id())
            .finish_non_exhaustive()
    }
}

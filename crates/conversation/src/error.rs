use chat_provider::TransportError;
use conversation_store::ConversationStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot redo: the conversation has no messages")]
    EmptyHistory,

    #[error("cannot redo: the last message is not an assistant reply")]
    NoAssistantReply,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] ConversationStoreError),
}

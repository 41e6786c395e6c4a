//! Conversation state engine.
//!
//! A [`Conversation`] owns one dialogue's message history and keeps its
//! running token count in step with it after every mutation. Completion
//! service, tokenizer, and store are injected at construction.

mod code_block;
mod engine;
mod error;
pub mod token_limit;

pub use code_block::extract_code_block;
pub use engine::Conversation;
pub use error::ConversationError;
pub use token_limit::token_limit_for_model;

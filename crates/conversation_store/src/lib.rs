mod error;
mod paths;
mod search;
mod store;

pub use error::ConversationStoreError;
pub use paths::{
    conversation_file_name, conversation_id_from_path, conversations_dir,
    default_conversations_dir,
};
pub use search::{search, ConversationMatches, SearchMatch, SearchReport, SkippedFile};
pub use store::{ConversationStore, StoredConversation};

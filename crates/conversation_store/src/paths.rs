use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::ConversationStoreError;

pub const CONVERSATIONS_DIR: [&str; 2] = ["Chat", "conversations"];
pub const CONVERSATION_EXTENSION: &str = "json";

#[must_use]
pub fn conversations_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(CONVERSATIONS_DIR[0]).join(CONVERSATIONS_DIR[1])
}

/// `<platform data dir>/Chat/conversations`.
pub fn default_conversations_dir() -> Result<PathBuf, ConversationStoreError> {
    dirs::data_dir()
        .map(|data_dir| conversations_dir(&data_dir))
        .ok_or(ConversationStoreError::DataDirUnavailable)
}

#[must_use]
pub fn conversation_file_name(id: &Uuid) -> String {
    format!("{id}.{CONVERSATION_EXTENSION}")
}

/// Recovers the conversation id from a `<id>.json` file name.
pub fn conversation_id_from_path(path: &Path) -> Result<Uuid, ConversationStoreError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| Uuid::parse_str(stem).ok())
        .ok_or_else(|| ConversationStoreError::InvalidConversationId {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversations_dir_nests_under_chat() {
        assert_eq!(
            conversations_dir(Path::new("/data")),
            PathBuf::from("/data/Chat/conversations")
        );
    }

    #[test]
    fn file_name_round_trips_to_id() {
        let id = Uuid::now_v7();
        let path = PathBuf::from("/data").join(conversation_file_name(&id));

        assert_eq!(conversation_id_from_path(&path).expect("valid id"), id);
    }

    #[test]
    fn non_uuid_stem_is_rejected() {
        let error = conversation_id_from_path(Path::new("/data/notes.json"))
            .err()
            .expect("non-uuid stem must fail");
        assert!(matches!(
            error,
            ConversationStoreError::InvalidConversationId { .. }
        ));
    }
}

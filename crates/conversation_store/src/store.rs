use std::fs::{self, DirBuilder, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chat_provider::Message;
use uuid::Uuid;

use crate::error::ConversationStoreError;
use crate::paths::{
    conversation_file_name, conversation_id_from_path, default_conversations_dir,
    CONVERSATION_EXTENSION,
};

/// One conversation read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConversation {
    pub id: Uuid,
    pub path: PathBuf,
    pub messages: Vec<Message>,
}

/// Directory of `<id>.json` files, each a bare JSON array of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStore {
    root: PathBuf,
}

impl ConversationStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the store at the platform data directory.
    pub fn at_default_location() -> Result<Self, ConversationStoreError> {
        default_conversations_dir().map(Self::new)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        self.root.join(conversation_file_name(id))
    }

    /// Writes `messages` to the conversation's file, replacing any previous
    /// contents, and returns the path written.
    pub fn save(
        &self,
        id: &Uuid,
        messages: &[Message],
    ) -> Result<PathBuf, ConversationStoreError> {
        self.ensure_root()?;

        let path = self.path_for(id);
        let file = File::create(&path).map_err(|source| {
            ConversationStoreError::io("creating conversation file", &path, source)
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, messages)
            .map_err(|source| ConversationStoreError::json_serialize(&path, source))?;
        writer.flush().map_err(|source| {
            ConversationStoreError::io("writing conversation file", &path, source)
        })?;

        tracing::debug!(path = %path.display(), messages = messages.len(), "saved conversation");
        Ok(path)
    }

    /// Reads one conversation file. The id comes from the file name.
    pub fn load(&self, path: &Path) -> Result<StoredConversation, ConversationStoreError> {
        let id = conversation_id_from_path(path)?;
        let messages = read_messages(path)?;

        tracing::debug!(path = %path.display(), messages = messages.len(), "loaded conversation");
        Ok(StoredConversation {
            id,
            path: path.to_path_buf(),
            messages,
        })
    }

    /// Every `*.json` file under the root, sorted by file name.
    ///
    /// A missing root directory lists as empty.
    pub fn list(&self) -> Result<Vec<PathBuf>, ConversationStoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ConversationStoreError::io(
                    "listing conversations",
                    &self.root,
                    source,
                ))
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                ConversationStoreError::io("listing conversations", &self.root, source)
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(CONVERSATION_EXTENSION)
            {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Loads the most recently modified conversation.
    ///
    /// Ties on modification time go to the first file in name order.
    pub fn latest(&self) -> Result<StoredConversation, ConversationStoreError> {
        let mut latest: Option<(SystemTime, PathBuf)> = None;

        for path in self.list()? {
            let modified = fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .map_err(|source| {
                    ConversationStoreError::io("reading modification time", &path, source)
                })?;

            let newer = match &latest {
                Some((best, _)) => modified > *best,
                None => true,
            };
            if newer {
                latest = Some((modified, path));
            }
        }

        let (_, path) = latest.ok_or_else(|| ConversationStoreError::NoConversationsFound {
            root: self.root.clone(),
        })?;
        self.load(&path)
    }

    fn ensure_root(&self) -> Result<(), ConversationStoreError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }

        builder.create(&self.root).map_err(|source| {
            ConversationStoreError::io("creating conversations directory", &self.root, source)
        })
    }
}

pub(crate) fn read_messages(path: &Path) -> Result<Vec<Message>, ConversationStoreError> {
    let file = File::open(path)
        .map_err(|source| ConversationStoreError::io("opening conversation file", path, source))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|source| ConversationStoreError::json_parse(path, source))
}

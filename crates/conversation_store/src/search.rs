use std::fmt;
use std::path::PathBuf;

use chat_provider::Role;
use regex::Regex;
use uuid::Uuid;

use crate::error::ConversationStoreError;
use crate::paths::conversation_id_from_path;
use crate::store::{read_messages, ConversationStore};

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub role: Role,
    pub line: String,
}

/// Matches found in one conversation, in message-then-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMatches {
    pub id: Uuid,
    pub matches: Vec<SearchMatch>,
}

/// A file that could not be searched.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: ConversationStoreError,
}

#[derive(Debug, Default)]
pub struct SearchReport {
    pub conversations: Vec<ConversationMatches>,
    pub skipped: Vec<SkippedFile>,
}

impl SearchReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// Renders one block per matching conversation:
/// `[<id>]`, then `[<role>] <line>` per match, then a blank line.
impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for conversation in &self.conversations {
            writeln!(f, "[{}]", conversation.id)?;
            for found in &conversation.matches {
                writeln!(f, "[{}] {}", found.role, found.line)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Scans every stored conversation, in file-name order, for lines where
/// `pattern` matches anywhere.
///
/// Files that cannot be read or parsed are recorded in
/// [`SearchReport::skipped`] and the scan continues. Only failing to list the
/// directory itself is an error.
pub fn search(
    store: &ConversationStore,
    pattern: &Regex,
) -> Result<SearchReport, ConversationStoreError> {
    let mut report = SearchReport::default();

    for path in store.list()? {
        let parsed = conversation_id_from_path(&path)
            .and_then(|id| read_messages(&path).map(|messages| (id, messages)));
        let (id, messages) = match parsed {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping unreadable conversation");
                report.skipped.push(SkippedFile { path, error });
                continue;
            }
        };

        let matches: Vec<SearchMatch> = messages
            .iter()
            .flat_map(|message| {
                message
                    .content
                    .lines()
                    .filter(|line| pattern.is_match(line))
                    .map(|line| SearchMatch {
                        role: message.role,
                        line: line.to_string(),
                    })
            })
            .collect();

        if !matches.is_empty() {
            report.conversations.push(ConversationMatches { id, matches });
        }
    }

    Ok(report)
}

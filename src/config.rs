//! Config file handling and prompt formatting.
//!
//! The config file is a JSON object. Command-line flags override its values,
//! and `--save` writes the merged result back.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::cli::Cli;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_PROMPT: &str = "%t/%T > ";
pub const CONFIG_FILE: [&str; 2] = ["Chat", "chat.json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while {operation} config file {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not determine the platform config directory")]
    ConfigDirUnavailable,
}

/// `<platform config dir>/Chat/chat.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE[0]).join(CONFIG_FILE[1]))
        .ok_or(ConfigError::ConfigDirUnavailable)
}

/// Values as stored in the config file. Keys the client does not use are
/// kept in `extra` so `--save` writes them back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apikey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Effective settings after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub apikey: Option<String>,
    pub model: String,
    pub prompt: String,
    pub base_url: Option<String>,
    pub stream: bool,
    pub organization: Option<String>,
    pub timeout: Option<Duration>,
}

impl ChatConfig {
    /// Reads the config file. A missing file reads as an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "reading",
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Command-line values win over file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(apikey) = &cli.apikey {
            self.apikey = Some(apikey.clone());
        }
        if let Some(prompt) = &cli.prompt {
            self.prompt = Some(prompt.clone());
        }
        if let Some(model) = cli.model.as_ref().filter(|model| !model.is_empty()) {
            self.model = Some(model.clone());
        }
    }

    /// Fills the keys that have defaults, so a saved file is self-describing.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.model.get_or_insert_with(|| DEFAULT_MODEL.to_string());
        self.prompt.get_or_insert_with(|| DEFAULT_PROMPT.to_string());
        self
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |operation, source| ConfigError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error("creating directory for", source))?;
        }

        let body = serde_json::to_string(self).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body).map_err(|source| io_error("writing", source))?;

        tracing::debug!(path = %path.display(), "saved config");
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            apikey: self.apikey.clone(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompt: self
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            base_url: self.base_url.clone(),
            stream: self.stream.unwrap_or(true),
            organization: self.organization.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

/// Replaces `%t` with the token count and `%T` with the token limit (`?`
/// when the model's limit is unknown).
#[must_use]
pub fn format_prompt(template: &str, token_count: usize, token_limit: Option<usize>) -> String {
    let limit = token_limit.map_or_else(|| "?".to_string(), |limit| limit.to_string());
    template
        .replace("%t", &token_count.to_string())
        .replace("%T", &limit)
}

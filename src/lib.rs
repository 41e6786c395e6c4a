//! `chat`: a resumable, searchable command-line chat client.
//!
//! The binary wires the config file and flags to a provider, then hands a
//! [`conversation::Conversation`] to the prompt loop in [`repl`].

pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod logging;
pub mod providers;
pub mod repl;

use std::io::Write;

use anyhow::{anyhow, Context};
use conversation::Conversation;
use conversation_store::{search, ConversationStore};
use regex::Regex;

pub use crate::cli::Cli;
pub use crate::config::{format_prompt, ChatConfig, Settings};

use crate::clipboard::SystemClipboard;
use crate::config::default_config_path;
use crate::repl::{Repl, RustylineSource};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    let mut config = ChatConfig::load(&config_path)?;
    config.apply_cli(&cli);
    if cli.save {
        config.clone().with_defaults().save(&config_path)?;
        println!("Saved config to {}", config_path.display());
    }
    let settings = config.settings();

    let store = ConversationStore::at_default_location()?;

    if let Some(pattern) = &cli.search {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        return run_search(&store, pattern, &mut stdout.lock(), &mut stderr.lock());
    }

    let bundle = providers::provider_from_env(&settings).map_err(|error| anyhow!(error))?;
    let conversation = if cli.resume {
        Conversation::load_latest(&settings.model, bundle.service, bundle.tokenizer, store)
            .context("failed to resume conversation")?
    } else {
        Conversation::new(&settings.model, bundle.service, bundle.tokenizer, store)?
    };
    let conversation = conversation.with_streaming(settings.stream);

    tracing::debug!(
        id = %conversation.id(),
        model = conversation.model(),
        messages = conversation.messages().len(),
        "starting session"
    );

    let mut repl = Repl::new(
        conversation,
        settings.prompt,
        Box::new(RustylineSource::new()?),
        Box::new(SystemClipboard),
    );

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    repl.run(&mut stdout.lock(), &mut stderr.lock())
}

/// Prints every matching line in the stored conversations. Unreadable files
/// are reported on `err` and skipped.
pub fn run_search(
    store: &ConversationStore,
    pattern: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<()> {
    let regex = Regex::new(pattern).with_context(|| format!("invalid search pattern '{pattern}'"))?;
    let report = search(store, &regex)?;

    write!(out, "{report}")?;
    for skipped in &report.skipped {
        writeln!(
            err,
            "warning: skipped {}: {}",
            skipped.path.display(),
            skipped.error
        )?;
    }
    Ok(())
}

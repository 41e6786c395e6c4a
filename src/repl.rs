//! The interactive prompt loop.

use std::io::Write;

use anyhow::Context;
use conversation::Conversation;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::clipboard::Clipboard;
use crate::commands::{parse_command, ReplCommand};
use crate::config::format_prompt;

/// What one prompt read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or closed input.
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome>;
}

/// Line editing with in-session history.
pub struct RustylineSource {
    editor: DefaultEditor,
}

impl RustylineSource {
    pub fn new() -> anyhow::Result<Self> {
        let editor = DefaultEditor::new().context("failed to initialize line editor")?;
        Ok(Self { editor })
    }
}

impl LineSource for RustylineSource {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(error) => Err(error).context("failed to read input"),
        }
    }
}

pub struct Repl {
    conversation: Conversation,
    prompt_template: String,
    input: Box<dyn LineSource>,
    clipboard: Box<dyn Clipboard>,
}

impl Repl {
    pub fn new(
        conversation: Conversation,
        prompt_template: impl Into<String>,
        input: Box<dyn LineSource>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Self {
            conversation,
            prompt_template: prompt_template.into(),
            input,
            clipboard,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Runs until `.exit` or end of input, then saves the conversation.
    ///
    /// Replies stream to `out`; per-turn failures go to `err` and the loop
    /// continues. The conversation is saved even when the loop stops on an
    /// input or output error; that error is still returned.
    pub fn run(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<()> {
        let session = self.read_loop(out, err);
        let saved = self.conversation.save();

        match (session, saved) {
            (Ok(()), saved) => {
                match saved? {
                    Some(path) => writeln!(out, "Saved conversation to {}", path.display())?,
                    None => writeln!(out, "Nothing to save")?,
                }
                Ok(())
            }
            (Err(error), Ok(Some(path))) => {
                let _ = writeln!(err, "Saved conversation to {}", path.display());
                Err(error)
            }
            (Err(error), Ok(None)) => Err(error),
            (Err(error), Err(save_error)) => {
                tracing::warn!(%save_error, "failed to save conversation after session error");
                Err(error)
            }
        }
    }

    fn read_loop(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<()> {
        loop {
            let prompt = format_prompt(
                &self.prompt_template,
                self.conversation.token_count(),
                self.conversation.token_limit(),
            );

            let line = match self.input.read_line(&prompt)? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => {
                    writeln!(out)?;
                    continue;
                }
                ReadOutcome::Eof => break,
            };

            match parse_command(&line) {
                Some(ReplCommand::Exit) => break,
                Some(ReplCommand::Redo) => self.redo(out, err)?,
                Some(ReplCommand::Copy) => self.copy(out, err)?,
                None if line.trim().is_empty() => {}
                None => self.send(line, out, err)?,
            }
        }
        Ok(())
    }

    fn send(&mut self, line: String, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<()> {
        let mut echo = StreamEcho::new(out);
        let result = self
            .conversation
            .add_user_message(line, &mut |piece| echo.write(piece))
            .map(|_| ());
        echo.finish(result, err)
    }

    fn redo(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<()> {
        let mut echo = StreamEcho::new(out);
        let result = self
            .conversation
            .redo(&mut |piece| echo.write(piece))
            .map(|_| ());
        echo.finish(result, err)
    }

    fn copy(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<()> {
        let Some(code) = self.conversation.extract_code_block() else {
            writeln!(err, "error: no code block in the last message")?;
            return Ok(());
        };

        if let Err(error) = self.clipboard.set_text(&code) {
            writeln!(err, "error: failed to copy to clipboard: {error:#}")?;
            return Ok(());
        }
        writeln!(out, "{code}")?;
        Ok(())
    }
}

impl std::fmt::Debug for Repl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repl")
            .field("conversation", &self.conversation)
            .field("prompt_template", &self.prompt_template)
            .finish_non_exhaustive()
    }
}

/// Writes streamed pieces as they arrive and keeps the first write failure.
struct StreamEcho<'a> {
    out: &'a mut dyn Write,
    wrote: bool,
    failure: Option<std::io::Error>,
}

impl<'a> StreamEcho<'a> {
    fn new(out: &'a mut dyn Write) -> Self {
        Self {
            out,
            wrote: false,
            failure: None,
        }
    }

    fn write(&mut self, piece: &str) {
        if self.failure.is_some() {
            return;
        }
        self.wrote = true;
        if let Err(error) = self.out.write_all(piece.as_bytes()).and_then(|()| self.out.flush()) {
            self.failure = Some(error);
        }
    }

    fn finish<E: std::fmt::Display>(
        self,
        result: Result<(), E>,
        err: &mut dyn Write,
    ) -> anyhow::Result<()> {
        if let Some(error) = self.failure {
            return Err(error).context("failed to write reply");
        }

        match result {
            Ok(()) => writeln!(self.out)?,
            Err(error) => {
                if self.wrote {
                    writeln!(self.out)?;
                }
                writeln!(err, "error: {error}")?;
            }
        }
        Ok(())
    }
}

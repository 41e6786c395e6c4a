use std::path::PathBuf;

use clap::Parser;

/// Terminal chat client for OpenAI-compatible completion APIs.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "chat", version, about)]
pub struct Cli {
    /// API key; overrides `apikey` in the config file.
    #[arg(long)]
    pub apikey: Option<String>,

    /// Prompt template. `%t` is the token count, `%T` the model's token limit.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Write the merged configuration back to the config file.
    #[arg(long)]
    pub save: bool,

    /// Config file to use instead of the platform default.
    #[arg(short = 'f', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model identifier, e.g. `gpt-4`.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Resume the most recently modified conversation.
    #[arg(long)]
    pub resume: bool,

    /// Search saved conversations for lines matching a regular expression, then exit.
    #[arg(short, long, value_name = "REGEX")]
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn parses_all_flags() {
        let cli = Cli::parse_from([
            "chat", "--apikey", "sk", "--prompt", "> ", "--save", "-f", "c.json", "-m", "gpt-4",
            "--resume", "-s", "foo.*",
        ]);

        assert_eq!(cli.apikey.as_deref(), Some("sk"));
        assert_eq!(cli.prompt.as_deref(), Some("> "));
        assert!(cli.save);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("c.json")));
        assert_eq!(cli.model.as_deref(), Some("gpt-4"));
        assert!(cli.resume);
        assert_eq!(cli.search.as_deref(), Some("foo.*"));
    }

    #[test]
    fn flags_are_optional() {
        let cli = Cli::parse_from(["chat"]);
        assert!(cli.apikey.is_none());
        assert!(!cli.save);
        assert!(!cli.resume);
        assert!(cli.search.is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

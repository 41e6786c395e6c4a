use std::process::ExitCode;

use clap::Parser;

use chat_cli::logging::init_logging;
use chat_cli::Cli;

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match chat_cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// In-session commands. Anything else typed at the prompt is sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Exit,
    Redo,
    Copy,
}

/// Commands must match the whole line exactly; `.exit now` is a message.
pub fn parse_command(input: &str) -> Option<ReplCommand> {
    match input {
        ".exit" => Some(ReplCommand::Exit),
        ".redo" => Some(ReplCommand::Redo),
        ".copy" => Some(ReplCommand::Copy),
        _ => None,
    }
}

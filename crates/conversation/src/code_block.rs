use std::sync::OnceLock;

use regex::Regex;

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"^```").expect("static regex is valid"))
}

/// Returns the body of the first fenced code block in `content`.
///
/// Any line starting with three backticks is a fence, with or without a
/// language tag: the first one opens the block and the next one closes it.
/// `None` when there is no opening fence or it is never closed.
#[must_use]
pub fn extract_code_block(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let open = lines.iter().position(|line| fence().is_match(line))?;
    let body = &lines[open + 1..];
    let close = body.iter().position(|line| fence().is_match(line))?;

    Some(body[..close].join(LINE_SEPARATOR))
}

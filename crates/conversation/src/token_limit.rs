/// Context sizes, in tokens, for known model families.
pub const TOKEN_LIMITS: &[(&str, usize)] = &[
    ("gpt-3.5-turbo", 4096),
    ("gpt-3.5-turbo-16k", 16384),
    ("gpt-4", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-turbo", 128000),
    ("gpt-4o", 128000),
    ("gpt-4o-mini", 128000),
];

/// Resolves the longest registered prefix of `model`.
///
/// Strips one trailing character at a time until an exact table entry
/// matches, so `gpt-4-32k-0613` resolves to `gpt-4-32k`, not `gpt-4`.
#[must_use]
pub fn token_limit_for_model(model: &str) -> Option<usize> {
    let mut candidate = model;
    loop {
        if let Some((_, limit)) = TOKEN_LIMITS.iter().find(|(name, _)| *name == candidate) {
            return Some(*limit);
        }

        let mut chars = candidate.chars();
        chars.next_back()?;
        candidate = chars.as_str();
        if candidate.is_empty() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::token_limit_for_model;

    #[test]
    fn exact_names_resolve() {
        assert_eq!(token_limit_for_model("gpt-3.5-turbo"), Some(4096));
        assert_eq!(token_limit_for_model("gpt-4o-mini"), Some(128000));
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(token_limit_for_model("gpt-4-32k-0613"), Some(32768));
        assert_eq!(token_limit_for_model("gpt-3.5-turbo-16k-0613"), Some(16384));
        assert_eq!(token_limit_for_model("gpt-4-0613"), Some(8192));
        assert_eq!(token_limit_for_model("gpt-4o-2024-08-06"), Some(128000));
    }

    #[test]
    fn unknown_models_have_no_limit() {
        assert_eq!(token_limit_for_model("claude-3"), None);
        assert_eq!(token_limit_for_model(""), None);
        assert_eq!(token_limit_for_model("gpt"), None);
    }

    #[test]
    fn multibyte_suffixes_are_stripped_by_character() {
        assert_eq!(token_limit_for_model("gpt-4é"), Some(8192));
    }
}

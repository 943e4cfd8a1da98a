//! Keyword matching over commands and resource paths.

/// Splits text into lowercase alphanumeric tokens.
///
/// `"Deploy src/api-auth.rs"` becomes `["deploy", "src", "api", "auth", "rs"]`.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Returns true if `phrase` occurs in `tokens` as a contiguous token run.
///
/// Multi-word keywords (`"rest api"`, `"rest-api"`) are tokenized the same
/// way as the text they are matched against.
#[must_use]
pub fn mentions(tokens: &[String], phrase: &str) -> bool {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    tokens.windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Returns true if any of `phrases` occurs in `tokens`.
#[must_use]
pub fn mentions_any<'a, I>(tokens: &[String], phrases: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    phrases.into_iter().any(|p| mentions(tokens, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_paths_and_punctuation() {
        assert_eq!(
            tokenize("Deploy src/api-auth.rs NOW!"),
            vec!["deploy", "src", "api", "auth", "rs", "now"]
        );
        assert!(tokenize("  --- ").is_empty());
    }

    #[test]
    fn mentions_matches_whole_tokens_only() {
        let tokens = tokenize("design rest-api for users");
        assert!(mentions(&tokens, "api"));
        assert!(mentions(&tokens, "rest api"));
        assert!(mentions(&tokens, "REST-API"));
        assert!(!mentions(&tokens, "ap"));
        assert!(!mentions(&tokens, "api users"));
        assert!(!mentions(&tokens, ""));
    }

    #[test]
    fn mentions_any_short_circuits() {
        let tokens = tokenize("optimize the cache");
        let phrases = vec!["latency".to_string(), "cache".to_string()];
        assert!(mentions_any(&tokens, &phrases));
        assert!(!mentions_any(&tokens, &Vec::<String>::new()));
    }
}

// src/bot/patterns.rs - Stateless link/mention classifier

use anyhow::Result;
use regex::{Regex, RegexBuilder};

/// Detects disallowed links and mentions in a text blob.
///
/// Stateless and deterministic: the same input always classifies the
/// same way, which keeps re-evaluation and tests reproducible. Regexes
/// are compiled once at construction.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    link: Regex,
    mention: Regex,
}

impl PatternMatcher {
    pub fn new() -> Result<Self> {
        // http(s) URLs, bare www. prefixes and Telegram deep links.
        let link = RegexBuilder::new(r"(?:https?://|www\.|t\.me/|telegram\.me/)\S+")
            .case_insensitive(true)
            .build()?;

        // @handle as a word-boundary token: start of text or whitespace,
        // then @ and at least one word character. "user@host" is not a
        // mention.
        let mention = RegexBuilder::new(r"(?:^|\s)@\w+")
            .case_insensitive(true)
            .build()?;

        Ok(Self { link, mention })
    }

    /// True when the text contains a disallowed link or mention. Empty
    /// or malformed input simply does not match.
    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.link.is_match(text) || self.mention.is_match(text)
    }
}

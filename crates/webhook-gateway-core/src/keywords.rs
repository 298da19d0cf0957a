//! Activation keyword detection in comment bodies.

use regex::Regex;

/// Mention that activates a session
pub const DEFAULT_KEYWORD: &str = "@amber";

/// Errors building a [`KeywordDetector`]
#[derive(Debug, thiserror::Error)]
pub enum KeywordError {
    #[error("keyword must not be empty")]
    Empty,

    #[error("keyword could not be compiled: {0}")]
    Pattern(#[from] regex::Error),
}

/// Detects a mention keyword such as `@amber` in free text.
///
/// A mention counts when it:
/// - starts the text, or follows a character that is not alphanumeric or `_`
///   (whitespace, punctuation, emoji)
/// - is followed by the end of text or a non-word character other than `-`
///
/// Matching ignores case. `@amberbot`, `user@amber.com` and `@amber-bot` are
/// not mentions.
#[derive(Debug, Clone)]
pub struct KeywordDetector {
    keyword: String,
    pattern: Regex,
}

impl KeywordDetector {
    /// Build a detector for `keyword`
    pub fn new(keyword: &str) -> Result<Self, KeywordError> {
        if keyword.trim().is_empty() {
            return Err(KeywordError::Empty);
        }

        let pattern = Regex::new(&format!("(?i){}", regex::escape(keyword)))?;
        Ok(Self {
            keyword: keyword.to_string(),
            pattern,
        })
    }

    /// The keyword this detector looks for
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Whether `comment_body` contains the keyword as a mention
    pub fn detect(&self, comment_body: &str) -> bool {
        self.find_mention_end(comment_body).is_some()
    }

    /// Text following the first mention, trimmed and with original casing.
    ///
    /// Returns an empty string when there is no mention.
    pub fn extract_command(&self, comment_body: &str) -> String {
        match self.find_mention_end(comment_body) {
            Some(end) => comment_body[end..].trim().to_string(),
            None => String::new(),
        }
    }

    fn find_mention_end(&self, text: &str) -> Option<usize> {
        self.pattern
            .find_iter(text)
            .find(|m| {
                let before = text[..m.start()].chars().next_back();
                let after = text[m.end()..].chars().next();
                !before.is_some_and(is_word_char)
                    && !after.is_some_and(|c| is_word_char(c) || c == '-')
            })
            .map(|m| m.end())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
#[path = "keywords_tests.rs"]
mod tests;

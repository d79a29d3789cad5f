use crate::error::TopicError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TOPIC_PREFIX: &str = "/topics/";
pub const MAX_TOPIC_NAME_LEN: usize = 900;

/// A validated topic name, e.g. `news` for the path `/topics/news`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Parses either a bare topic name or a `/topics/<name>` path.
    ///
    /// # Errors
    /// Returns an error if the name is empty, longer than 900 characters, or contains
    /// characters outside `[a-zA-Z0-9-_.~%]`.
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        let name = raw.strip_prefix(TOPIC_PREFIX).unwrap_or(raw);
        if name.is_empty() {
            return Err(TopicError::Empty);
        }
        if name.len() > MAX_TOPIC_NAME_LEN {
            return Err(TopicError::TooLong(name.len()));
        }
        if let Some(invalid) = name.chars().find(|c| !is_topic_char(*c)) {
            return Err(TopicError::InvalidCharacter(invalid));
        }
        Ok(Self(name.to_owned()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The `/topics/<name>` form used as a message recipient.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{TOPIC_PREFIX}{}", self.0)
    }

    /// Returns true if `recipient` addresses this topic.
    #[must_use]
    pub fn matches_recipient(&self, recipient: &str) -> bool {
        recipient.strip_prefix(TOPIC_PREFIX) == Some(self.0.as_str())
    }
}

const fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%')
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TOPIC_PREFIX}{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name_and_path() {
        let bare = Topic::parse("weather").unwrap();
        let path = Topic::parse("/topics/weather").unwrap();
        assert_eq!(bare, path);
        assert_eq!(bare.name(), "weather");
        assert_eq!(bare.path(), "/topics/weather");
        assert_eq!(bare.to_string(), "/topics/weather");
    }

    #[test]
    fn test_parse_accepts_allowed_punctuation() {
        assert!(Topic::parse("a-b_c.d~e%20").is_ok());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(Topic::parse(""), Err(TopicError::Empty));
        assert_eq!(Topic::parse("/topics/"), Err(TopicError::Empty));
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert_eq!(Topic::parse("sports news"), Err(TopicError::InvalidCharacter(' ')));
        assert_eq!(Topic::parse("/topics/a/b"), Err(TopicError::InvalidCharacter('/')));
    }

    #[test]
    fn test_parse_rejects_long_names() {
        let name = "a".repeat(MAX_TOPIC_NAME_LEN + 1);
        assert_eq!(Topic::parse(&name), Err(TopicError::TooLong(901)));
        assert!(Topic::parse(&"a".repeat(MAX_TOPIC_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_matches_recipient() {
        let topic: Topic = "scores".parse().unwrap();
        assert!(topic.matches_recipient("/topics/scores"));
        assert!(!topic.matches_recipient("scores"));
        assert!(!topic.matches_recipient("/topics/scores2"));
    }
}

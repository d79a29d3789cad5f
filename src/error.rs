use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("Topic name cannot be empty")]
    Empty,
    #[error("Topic name is too long ({0} characters, max 900)")]
    TooLong(usize),
    #[error("Topic name contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Failures reported by the external messaging service.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Platform dependency missing: {0}")]
    Unavailable(String),
    #[error("App instance is not registered with the messaging service")]
    NotRegistered,
    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),
    #[error("Rejected by the messaging service: {code}")]
    Rejected { code: String, description: String },
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

impl PlatformError {
    /// Error code reported in the `error` field of a `send_error` message.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Unavailable(_) => "ServiceUnavailable",
            Self::NotRegistered => "NotRegistered",
            Self::InvalidTopic(_) => "InvalidTopic",
            Self::Rejected { code, .. } => code.as_str(),
            Self::Other(_) => "InternalError",
        }
    }

    /// Human readable description for the `error_description` field.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Rejected { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }
}

use crate::store::{ErrorClass, ErrorCode, LastError, ThreadPin};
use thiserror::Error;

/// Errors returned by the tag API.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Name conflict: {0}")]
    NameConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Malformed tag buffer: {0}")]
    MalformedBuffer(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid tag name: {0}")]
    InvalidName(String),

    #[error("Store error {code} ({class:?}): {message}")]
    Store {
        code: ErrorCode,
        class: ErrorClass,
        message: String,
    },

    /// The error returned by a foreach visitor, exactly as it was returned.
    #[error(transparent)]
    Callback(anyhow::Error),
}

impl TagError {
    /// Translate an engine status and its recorded detail.
    pub fn from_raw(code: ErrorCode, last: Option<LastError>) -> Self {
        let (class, message) = match last {
            Some(LastError { class, message }) => (class, message),
            None => (ErrorClass::None, format!("no error message set for {}", code)),
        };

        match code {
            ErrorCode::Exists => TagError::NameConflict(message),
            ErrorCode::NotFound => TagError::NotFound(message),
            ErrorCode::Peel => TagError::InvalidTarget(message),
            ErrorCode::Invalid => TagError::MalformedBuffer(message),
            ErrorCode::InvalidSpec => TagError::InvalidName(message),
            code => TagError::Store {
                code,
                class,
                message,
            },
        }
    }

    /// An unresolvable target reported by a create call.
    pub(crate) fn into_invalid_target(self) -> Self {
        match self {
            TagError::NotFound(message) => TagError::InvalidTarget(message),
            other => other,
        }
    }
}

impl ThreadPin {
    /// the typed error for a failed engine call made under this pin
    pub(crate) fn error(&self, code: ErrorCode) -> TagError {
        TagError::from_raw(code, self.take_error())
    }
}

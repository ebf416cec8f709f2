//! Error taxonomy for tag storage and sync
//!
//! Load-family operations absorb these and fall back to defaults; save-family
//! operations hand them to the caller so un-synced state can be flagged.

use thiserror::Error;

/// Rejected user input for tag and assignment operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Tag name cannot be empty")]
    EmptyName,
    #[error("Tag name '{0}' has no letters or digits to build an id from")]
    UnusableName(String),
    #[error("Tag already exists: {0}")]
    DuplicateTag(String),
    #[error("Unknown tag: {0}")]
    UnknownTag(String),
    #[error("Unknown slide: {0}")]
    UnknownSlide(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Gist sync is not configured. Run 'slidetags gist configure --token <TOKEN>' first.")]
    NotConfigured,
    #[error("GitHub API error: {status} - {message}")]
    Remote { status: u16, message: String },
    #[error("Could not reach GitHub: {0}")]
    Transport(String),
    #[error("Failed to parse stored data: {0}")]
    Parse(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid slide catalog: {0}")]
    Catalog(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status carried by a remote failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::Remote {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Error::Transport(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = Error::Remote {
            status: 401,
            message: "Bad credentials".to_string(),
        };
        assert_eq!(err.to_string(), "GitHub API error: 401 - Bad credentials");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_validation_converts() {
        let err: Error = ValidationError::DuplicateTag("sre".to_string()).into();
        assert!(matches!(err, Error::Validation(ValidationError::DuplicateTag(_))));
        assert_eq!(err.to_string(), "Tag already exists: sre");
    }

    #[test]
    fn test_json_error_is_parse() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.status(), None);
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevisionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Revision {0} is already being processed")]
    Busy(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RevisionError {
    /// Text suitable for a toast or inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            Self::Network(_) => {
                "Could not reach the server. Please check your connection.".to_string()
            }
            Self::Validation(message) => message.clone(),
            Self::Busy(_) => "This revision is already being processed.".to_string(),
            Self::NotFound(what) => format!("{} could not be found.", what),
            _ => "An unexpected error occurred.".to_string(),
        }
    }

    /// Transport failures and server-side (5xx) errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RevisionError>;

// Lets UI bridges hand the error across as a plain string
impl serde::Serialize for RevisionError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_surfaces_server_message() {
        let err = RevisionError::Http {
            status: 409,
            message: "Revision already resolved".to_string(),
        };
        assert_eq!(err.user_message(), "Revision already resolved");
        assert_eq!(err.to_string(), "HTTP error (409): Revision already resolved");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RevisionError::Network("refused".into()).is_retryable());
        assert!(RevisionError::Http { status: 503, message: String::new() }.is_retryable());
        assert!(!RevisionError::Http { status: 404, message: String::new() }.is_retryable());
        assert!(!RevisionError::Validation("no document".into()).is_retryable());
    }

    #[test]
    fn test_serializes_as_display_string() {
        let err = RevisionError::Busy("rev-1".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Revision rev-1 is already being processed\"");
    }
}

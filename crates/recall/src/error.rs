//! Error types for Recall

use thiserror::Error;

use crate::provider::ProviderError;

/// Main error type for Recall operations
#[derive(Error, Debug)]
pub enum RecallError {
    /// Caller supplied unusable input (empty text, bad date, zero limit, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding or completion provider failed or timed out
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Storage-related errors (LanceDB, schema, record decoding)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A record addressed by id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RecallError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            RecallError::Validation(_) => ErrorCode::E40001,
            RecallError::NotFound(_) => ErrorCode::E40002,
            RecallError::Provider(ProviderError::Config(_)) => ErrorCode::E50004,
            RecallError::Provider(_) => ErrorCode::E50002,
            RecallError::Persistence(_) => ErrorCode::E30001,
            RecallError::Config(_) => ErrorCode::E10002,
            RecallError::Io(_) | RecallError::Serialization(_) => ErrorCode::E10003,
        }
    }

    /// Message suitable for showing to the person chatting.
    ///
    /// Provider failures collapse into a single "assistant unavailable" notice so they can
    /// never be mistaken for a normal reply.
    pub fn user_message(&self) -> String {
        match self {
            RecallError::Provider(_) => {
                "The assistant is currently unavailable. Please try again later.".to_string()
            }
            RecallError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Error codes: `E` + two-digit category + three-digit sequence.
///
/// Categories: 10 system, 20 API, 30 database, 40 user input, 50 AI processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E10002,
    E10003,
    E30001,
    E40001,
    E40002,
    E50002,
    E50004,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E10002 => "E10002",
            ErrorCode::E10003 => "E10003",
            ErrorCode::E30001 => "E30001",
            ErrorCode::E40001 => "E40001",
            ErrorCode::E40002 => "E40002",
            ErrorCode::E50002 => "E50002",
            ErrorCode::E50004 => "E50004",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E10002 => "Configuration could not be loaded",
            ErrorCode::E10003 => "Unexpected system error",
            ErrorCode::E30001 => "Conversation store failure",
            ErrorCode::E40001 => "Invalid input",
            ErrorCode::E40002 => "Requested record does not exist",
            ErrorCode::E50002 => "Assistant reply could not be generated",
            ErrorCode::E50004 => "Model or provider misconfigured",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for Recall operations
pub type Result<T> = std::result::Result<T, RecallError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_codes_by_kind() {
        assert_eq!(
            RecallError::Validation("empty".into()).code(),
            ErrorCode::E40001
        );
        assert_eq!(RecallError::NotFound("x".into()).code(), ErrorCode::E40002);
        assert_eq!(
            RecallError::Persistence("disk".into()).code(),
            ErrorCode::E30001
        );
        assert_eq!(
            RecallError::Provider(ProviderError::Api("500".into())).code(),
            ErrorCode::E50002
        );
        assert_eq!(
            RecallError::Provider(ProviderError::Config("no key".into())).code(),
            ErrorCode::E50004
        );
    }

    #[test]
    fn test_provider_failure_user_message_is_not_a_reply() {
        let err = RecallError::Provider(ProviderError::Timeout {
            provider: "openai",
            timeout: Duration::from_secs(60),
        });
        let msg = err.user_message();
        assert!(msg.contains("unavailable"));
        assert!(!msg.contains("openai"));
    }

    #[test]
    fn test_display_includes_detail() {
        let err = RecallError::Persistence("Failed to open table".into());
        assert_eq!(err.to_string(), "Persistence error: Failed to open table");
        assert_eq!(ErrorCode::E30001.to_string(), "E30001");
    }
}

use std::fmt;

#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CliError {}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        CliError(s.to_string())
    }
}

impl From<recall::RecallError> for CliError {
    fn from(e: recall::RecallError) -> Self {
        CliError(format!("[{}] {}", e.code(), e.user_message()))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError(format!("JSON error: {e}"))
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError(format!("IO error: {e}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use recall::RecallError;

    #[test]
    fn test_recall_error_carries_code() {
        let err: CliError = RecallError::Validation("limit must be greater than 0".into()).into();
        assert_eq!(err.to_string(), "[E40001] limit must be greater than 0");
    }

    #[test]
    fn test_not_found_code() {
        let err: CliError = RecallError::NotFound("abc".into()).into();
        assert!(err.to_string().starts_with("[E40002]"));
    }
}

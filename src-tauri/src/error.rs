use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    /// No active session, or the auth service rejected the credentials.
    #[error("{0}")]
    Auth(String),

    /// Non-2xx response from a remote function. `message` is what the view shows;
    /// `status` and `body` are kept for logging.
    #[error("{message}")]
    Request {
        status: u16,
        message: String,
        body: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl AppError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        if self.is_auth() {
            return "auth";
        }
        match self {
            AppError::Auth(_) => "auth",
            AppError::Request { .. } => "request",
            AppError::NotFound(_) => "not_found",
            AppError::Network(_) => "network",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Decode(_) => "decode",
        }
    }

    /// Auth failures send the user back to the sign-in view instead of
    /// showing an inline message.
    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth(_))
            || matches!(self, AppError::Request { status: 401, .. })
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.to_string()
    }
}

/// Commands hand errors to the frontend as `{kind, message}`.
impl Serialize for AppError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("AppError", 2)?;
        st.serialize_field("kind", self.kind())?;
        st.serialize_field("message", &self.to_string())?;
        st.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_displays_message_only() {
        let err = AppError::Request {
            status: 500,
            message: "db timeout".to_string(),
            body: r#"{"error":"db timeout"}"#.to_string(),
        };
        assert_eq!(err.to_string(), "db timeout");
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_auth());
    }

    #[test]
    fn test_unauthorized_counts_as_auth() {
        let err = AppError::Request {
            status: 401,
            message: "Invalid JWT".to_string(),
            body: String::new(),
        };
        assert!(err.is_auth());
        assert!(AppError::Auth("No active session".to_string()).is_auth());
        assert!(!AppError::Network("reset".to_string()).is_auth());
        assert_eq!(err.kind(), "auth");
    }

    #[test]
    fn test_serializes_kind_and_message() {
        let err = AppError::Request {
            status: 500,
            message: "db timeout".to_string(),
            body: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({ "kind": "request", "message": "db timeout" })
        );
    }
}

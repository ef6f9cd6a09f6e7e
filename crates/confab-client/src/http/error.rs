//! Transport error taxonomy and classification.

use std::fmt;

use serde_json::Value;

/// Categories of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Request or connection timed out.
    Timeout,
    /// Network-level failure (connection refused, DNS, reset).
    Network,
    /// Server responded with an error carrying a message field.
    Server,
    /// The call was cancelled through its cancellation handle.
    Aborted,
    /// Anything else (unreadable error body, decode failure).
    Unknown,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Network => write!(f, "network"),
            TransportErrorKind::Server => write!(f, "server"),
            TransportErrorKind::Aborted => write!(f, "aborted"),
            TransportErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structured transport error with kind and user-facing message.
#[derive(Debug, Clone)]
pub struct TransportError {
    /// Error category.
    pub kind: TransportErrorKind,
    /// One-line summary suitable for display.
    pub message: String,
    /// Optional additional details (e.g. raw error body).
    pub details: Option<String>,
}

impl TransportError {
    /// Creates a new transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Self::new(TransportErrorKind::Timeout, "request timed out")
    }

    /// Creates a network error.
    pub fn network() -> Self {
        Self::new(TransportErrorKind::Network, "network error")
    }

    /// Creates a cancellation error.
    pub fn aborted() -> Self {
        Self::new(TransportErrorKind::Aborted, "request aborted")
    }

    /// Creates the generic fallback error.
    pub fn unknown() -> Self {
        Self::new(TransportErrorKind::Unknown, "system error")
    }

    /// Creates the fallback error with extra detail.
    pub fn unknown_with(details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::unknown()
        }
    }

    /// Classifies a non-success response body.
    ///
    /// Reads the server-supplied `message` (or `msg`) field when present,
    /// falling back to the generic "system error" string.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        if let Ok(json) = serde_json::from_str::<Value>(body) {
            let message = json
                .get("message")
                .or_else(|| json.get("msg"))
                .and_then(Value::as_str);
            if let Some(message) = message {
                return Self {
                    kind: TransportErrorKind::Server,
                    message: message.to_string(),
                    details: Some(format!("HTTP {status}")),
                };
            }
        }
        Self {
            kind: TransportErrorKind::Unknown,
            message: "system error".to_string(),
            details: Some(if body.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {body}")
            }),
        }
    }

    /// Returns true if this error came from an explicit abort.
    pub fn is_aborted(&self) -> bool {
        self.kind == TransportErrorKind::Aborted
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Classifies a reqwest error into the transport taxonomy.
pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout()
    } else if e.is_connect() || e.is_request() {
        TransportError {
            details: Some(e.to_string()),
            ..TransportError::network()
        }
    } else {
        TransportError::unknown_with(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_with_message_field_is_a_server_error() {
        let err = TransportError::from_error_body(500, r#"{"message":"quota exceeded"}"#);
        assert_eq!(err.kind, TransportErrorKind::Server);
        assert_eq!(err.message, "quota exceeded");
    }

    #[test]
    fn error_body_with_msg_field_is_a_server_error() {
        let err = TransportError::from_error_body(400, r#"{"msg":"bad conversation id"}"#);
        assert_eq!(err.kind, TransportErrorKind::Server);
        assert_eq!(err.message, "bad conversation id");
    }

    #[test]
    fn unreadable_error_body_falls_back_to_system_error() {
        let err = TransportError::from_error_body(502, "<html>bad gateway</html>");
        assert_eq!(err.kind, TransportErrorKind::Unknown);
        assert_eq!(err.message, "system error");
        assert!(err.details.as_deref().unwrap().contains("502"));
    }

    #[test]
    fn display_messages_match_the_classification() {
        assert_eq!(TransportError::timeout().to_string(), "request timed out");
        assert_eq!(TransportError::network().to_string(), "network error");
        assert_eq!(TransportError::aborted().to_string(), "request aborted");
        assert_eq!(TransportError::unknown().to_string(), "system error");
    }
}

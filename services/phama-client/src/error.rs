//! Error types for the chat client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the gateway, the session controller and the input paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response from the backend (connect failure, timeout, broken body)
    #[error("Network error: {0}")]
    Network(String),

    /// Backend rejected or expired the credential
    #[error("Authentication error: {0}")]
    Auth(String),

    /// No session token is held locally
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Malformed login/signup/message input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Backend failed or answered with an unexpected status
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Platform lacks a required capability (speech recognition)
    #[error("Unsupported capability: {0}")]
    Capability(String),

    /// Local credential persistence failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Map a non-success HTTP status and its body onto the error taxonomy.
    ///
    /// FastAPI-style `{"detail": "..."}` bodies are unwrapped to the detail text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            401 | 403 => Self::Auth(message),
            400 | 409 | 422 => Self::Validation(message),
            _ => Self::Server { status, message },
        }
    }

    /// Whether this error must tear the session down.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::NotAuthenticated)
    }

    /// Short, stable label for structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Auth(_) => "auth",
            Self::NotAuthenticated => "not_authenticated",
            Self::Validation(_) => "validation",
            Self::Server { .. } => "server",
            Self::Capability(_) => "capability",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".to_string())
        } else if err.is_decode() {
            Self::Server {
                status: err.status().map_or(200, |s| s.as_u16()),
                message: format!("invalid response body: {err}"),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<phama_common::Error> for ClientError {
    fn from(err: phama_common::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(401, "auth" ; "unauthorized")]
    #[test_case(403, "auth" ; "forbidden")]
    #[test_case(400, "validation" ; "bad request")]
    #[test_case(409, "validation" ; "conflict")]
    #[test_case(422, "validation" ; "unprocessable")]
    #[test_case(404, "server" ; "not found")]
    #[test_case(500, "server" ; "internal")]
    #[test_case(503, "server" ; "unavailable")]
    fn status_mapping(status: u16, kind: &str) {
        assert_eq!(ClientError::from_status(status, "").kind(), kind);
    }

    #[test]
    fn detail_is_unwrapped() {
        let err = ClientError::from_status(401, r#"{"detail":"Could not validate credentials"}"#);
        assert_eq!(
            err,
            ClientError::Auth("Could not validate credentials".to_string())
        );
    }

    #[test]
    fn plain_body_is_kept() {
        let err = ClientError::from_status(502, "  Bad Gateway\n");
        assert_eq!(
            err,
            ClientError::Server {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn structured_detail_falls_back_to_body() {
        let body = r#"{"detail":[{"loc":["body","msg"],"msg":"field required"}]}"#;
        match ClientError::from_status(422, body) {
            ClientError::Validation(msg) => assert!(msg.contains("field required")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn auth_classification() {
        assert!(ClientError::Auth("expired".into()).is_auth());
        assert!(ClientError::NotAuthenticated.is_auth());
        assert!(!ClientError::Network("refused".into()).is_auth());
        assert!(!ClientError::Server {
            status: 500,
            message: String::new()
        }
        .is_auth());
    }

    #[test]
    fn storage_from_common_error() {
        let err: ClientError = phama_common::Error::Storage("read-only".into()).into();
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("read-only"));
    }
}

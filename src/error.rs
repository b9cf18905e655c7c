//! Error types for the resume edge

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for the resume edge
pub type Result<T> = std::result::Result<T, Error>;

/// Resume edge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The gateway (or backend) could not be reached at all
    #[error("Network error while requesting {url}: {message}")]
    Unreachable {
        /// Fully resolved URL of the failed request
        url: String,
        /// Transport failure message
        message: String,
    },

    /// Credentials are gone and the caller must sign in again
    #[error("Authentication expired. Please sign in again.")]
    AuthExpired,

    /// Non-success response carrying the backend's message
    #[error("{message}")]
    Upstream {
        /// Response status
        status: StatusCode,
        /// `detail` field, serialized JSON body or raw text
        message: String,
    },

    /// Success response whose body could not be decoded
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse {
        /// URL of the request
        url: String,
        /// Decode failure
        message: String,
    },

    /// Credential store failure
    #[error("Credential store error: {0}")]
    Credentials(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status code of an upstream failure, if any
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller has to authenticate again
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthExpired)
            || self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_displays_backend_message_only() {
        let err = Error::Upstream {
            status: StatusCode::BAD_REQUEST,
            message: "Title is required.".to_string(),
        };
        assert_eq!(err.to_string(), "Title is required.");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn unreachable_names_url() {
        let err = Error::Unreachable {
            url: "http://127.0.0.1:3000/api/proxy/auth/me".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("http://127.0.0.1:3000/api/proxy/auth/me"));
    }

    #[test]
    fn auth_failures() {
        assert!(Error::AuthExpired.is_auth_failure());
        let err = Error::Upstream {
            status: StatusCode::UNAUTHORIZED,
            message: "Token is invalid or expired".to_string(),
        };
        assert!(err.is_auth_failure());
    }
}

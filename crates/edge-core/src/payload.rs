//! JSON error payloads

use serde::{Deserialize, Serialize};

/// Body of the `502` the gateway synthesizes when the backend is unreachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyFailure {
    /// Human-readable summary including the resolved target URL
    pub detail: String,
    /// Message of the transport failure
    pub error: String,
    /// Message of the underlying cause, empty when there is none
    #[serde(default)]
    pub cause: String,
}

impl ProxyFailure {
    /// Build the payload for a failed attempt against `target`
    pub fn new(target: &str, error: impl Into<String>, cause: Option<String>) -> Self {
        Self {
            detail: format!("Proxy request failed: {target}"),
            error: error.into(),
            cause: cause.unwrap_or_default(),
        }
    }
}

/// Structured error body returned by the backend (`{"detail": "..."}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error message
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_failure_names_target() {
        let failure = ProxyFailure::new("http://web:8000/api/analyze/42?x=1", "error sending request", None);
        assert_eq!(failure.detail, "Proxy request failed: http://web:8000/api/analyze/42?x=1");
        assert_eq!(failure.cause, "");

        let json = serde_json::to_value(&failure).unwrap();
        assert!(json.get("detail").is_some());
        assert!(json.get("error").is_some());
        assert!(json.get("cause").is_some());
    }
}

//! Credential pair issued by the backend authentication service

use serde::{Deserialize, Serialize};

/// Access/refresh token pair plus the display username.
///
/// An absent `access_token` means the session is unauthenticated. A refresh
/// token without an access token is a valid transient state while a refresh
/// is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Longer-lived renewal token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Username shown in the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl CredentialPair {
    /// Pair created by a successful login
    pub fn new(access: impl Into<String>, refresh: impl Into<String>, username: Option<String>) -> Self {
        Self {
            access_token: Some(access.into()),
            refresh_token: Some(refresh.into()),
            username,
        }
    }

    /// Whether an access token is present
    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether nothing at all is stored
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.username.is_none()
    }
}

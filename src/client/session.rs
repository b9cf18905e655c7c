//! Backend operations used by the resume builder

use axum::http::Method;
use edge_core::CredentialPair;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::api::{ApiClient, RequestOptions};
use super::credentials::CredentialStore;
use super::download::Download;
use crate::Result;

/// Tokens returned by `POST /api/auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Access token
    pub access: String,
    /// Refresh token
    pub refresh: String,
    /// Canonical username, when the backend reports it
    #[serde(default)]
    pub username: Option<String>,
}

/// Account as returned by `/api/auth/me` and `/api/auth/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account ID
    #[serde(default)]
    pub id: Option<u64>,
    /// Username
    pub username: String,
    /// Email address (may be blank)
    #[serde(default)]
    pub email: String,
}

/// View-only link created by `POST /api/resumes/:id/share`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    /// Share token
    pub token: String,
    /// Site-relative share URL
    pub url: String,
}

impl ApiClient {
    /// Sign in with a username or email and store the credential pair
    pub async fn login(&self, identifier: &str, password: &str) -> Result<CredentialPair> {
        let options = RequestOptions::json(
            Method::POST,
            &json!({ "username": identifier, "identifier": identifier, "password": password }),
        )?;
        let value = self.request("/api/auth/login", &options, None).await?;
        let tokens: LoginResponse = serde_json::from_value(value)?;

        let username = tokens
            .username
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| identifier.to_string());
        let pair = CredentialPair::new(tokens.access, tokens.refresh, Some(username));
        self.store().save(&pair)?;

        info!(username = ?pair.username, "Signed in");
        Ok(pair)
    }

    /// Create an account (does not sign in)
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let options = RequestOptions::json(
            Method::POST,
            &json!({ "username": username, "email": email, "password": password }),
        )?;
        let value = self.request("/api/auth/register", &options, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Destroy the stored credential pair
    pub fn logout(&self) -> Result<()> {
        self.store().clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Current user; keeps the stored username in sync
    pub async fn me(&self) -> Result<User> {
        let value = self
            .request_authenticated("/api/auth/me", &RequestOptions::get())
            .await?;
        let user: User = serde_json::from_value(value)?;

        let mut pair = self.store().load()?;
        if pair.username.as_deref() != Some(user.username.as_str()) {
            pair.username = Some(user.username.clone());
            self.store().save(&pair)?;
        }
        Ok(user)
    }

    /// Saved resumes, newest first as ordered by the backend
    pub async fn list_resumes(&self) -> Result<Vec<Value>> {
        let value = self
            .request_authenticated("/api/resumes", &RequestOptions::get())
            .await?;
        Ok(match value {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    /// Delete a saved resume
    pub async fn delete_resume(&self, id: u64) -> Result<()> {
        self.request_authenticated(&format!("/api/resumes/{id}"), &RequestOptions::delete())
            .await?;
        Ok(())
    }

    /// Create a view-only share link
    pub async fn share_resume(&self, id: u64) -> Result<ShareLink> {
        let value = self
            .request_authenticated(&format!("/api/resumes/{id}/share"), &RequestOptions::post())
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Download the PDF export of a saved resume
    pub async fn export_resume(&self, id: u64) -> Result<Download> {
        self.download_authenticated(&format!("/api/resumes/{id}/export"))
            .await
    }

    /// Public view of a shared resume (no credentials attached)
    pub async fn shared_resume(&self, token: &str) -> Result<Value> {
        self.request(&format!("/api/share/{token}"), &RequestOptions::get(), None)
            .await
    }

    /// Status of an analysis job
    pub async fn analysis_status(&self, job_id: &str) -> Result<Value> {
        self.request_authenticated(&format!("/api/analyze/{job_id}"), &RequestOptions::get())
            .await
    }
}

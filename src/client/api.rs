//! Resilient API client
//!
//! Every backend call goes through [`ApiClient`]. It attaches the bearer
//! token, and when a token-bearing call comes back `401` it refreshes the
//! access token and re-issues the call exactly once:
//!
//! ```text
//! Issue ──401──▶ Refresh ──▶ Reissue ──▶ Done
//!   └──────────── other ────────────────▶ Done
//! ```
//!
//! `Reissue` always finishes the call. A second `401` means the session is
//! gone: the credential pair is destroyed and [`Error::AuthExpired`] returned
//! instead of starting another refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use bytes::Bytes;
use edge_core::normalize_api_path;
use reqwest::{Client, Response, redirect};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::download::{Download, filename_from_disposition};
use crate::config::ClientConfig;
use crate::{Error, Result};

/// Backend route that exchanges a refresh token for a new access token
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Message used when a failed response carries no usable body
const FALLBACK_ERROR: &str = "Request failed";

/// Method, extra headers and body of one logical call.
///
/// The body is kept as [`Bytes`] so the very same request can be re-issued
/// after a refresh.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method (GET by default)
    pub method: Method,
    /// Additional request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<Bytes>,
}

impl RequestOptions {
    /// Options for `method` without body
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// GET request
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// POST request without body
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// DELETE request
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// `method` with a JSON body
    pub fn json<T: Serialize + ?Sized>(method: Method, body: &T) -> Result<Self> {
        let mut options = Self::new(method);
        options.body = Some(Bytes::from(serde_json::to_vec(body)?));
        options
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(options)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a raw body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Progress of one logical call
enum Step {
    /// First attempt with the caller's token
    Issue,
    /// The token was rejected; obtain a new one unless a refresh finished
    /// after `generation` was observed
    Refresh { generation: u64 },
    /// Final attempt with the refreshed token
    Reissue { token: String },
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// HTTP client that talks to the backend through the gateway
pub struct ApiClient {
    /// HTTP client
    http: Client,
    /// Gateway URL including the mount prefix, without trailing slash
    gateway_url: String,
    /// Injected credential pair
    store: Arc<dyn CredentialStore>,
    /// Filename used when a download has no usable `Content-Disposition`
    default_filename: String,
    /// Serializes refreshes so concurrent `401`s share one refresh call
    refresh_lock: Mutex<()>,
    /// Number of refreshes completed so far
    refresh_generation: AtomicU64,
}

impl ApiClient {
    /// Create a client for the gateway at `gateway_url`
    pub fn new(gateway_url: &str, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http = Client::builder()
            .redirect(redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            store,
            default_filename: ClientConfig::default().default_filename,
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Ok(Self::new(&config.gateway_url, store)?.with_default_filename(&config.default_filename))
    }

    /// Override the fallback download filename
    #[must_use]
    pub fn with_default_filename(mut self, filename: &str) -> Self {
        self.default_filename = filename.to_string();
        self
    }

    /// Credential store backing this client
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Gateway URL for a backend path such as `/api/auth/me`
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.gateway_url, normalize_api_path(path))
    }

    /// Issue a call and parse its JSON body.
    ///
    /// `204 No Content` (and an empty body) yield `Value::Null`.
    pub async fn request(
        &self,
        path: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<Value> {
        let url = self.url_for(path);
        let response = self.execute(&url, options, access_token).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let body = response.bytes().await.map_err(|e| Error::InvalidResponse {
            url: url.clone(),
            message: e.to_string(),
        })?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| Error::InvalidResponse {
            url,
            message: e.to_string(),
        })
    }

    /// [`Self::request`] with the stored access token
    pub async fn request_authenticated(&self, path: &str, options: &RequestOptions) -> Result<Value> {
        let token = self.store.access_token()?;
        self.request(path, options, token.as_deref()).await
    }

    /// Issue a GET and return the raw payload with its suggested filename
    pub async fn download(&self, path: &str, access_token: Option<&str>) -> Result<Download> {
        let url = self.url_for(path);
        let response = self.execute(&url, &RequestOptions::get(), access_token).await?;

        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .map_or_else(|| self.default_filename.clone(), str::to_string);

        let bytes = response.bytes().await.map_err(|e| Error::InvalidResponse {
            url,
            message: e.to_string(),
        })?;

        Ok(Download { bytes, filename })
    }

    /// [`Self::download`] with the stored access token
    pub async fn download_authenticated(&self, path: &str) -> Result<Download> {
        let token = self.store.access_token()?;
        self.download(path, token.as_deref()).await
    }

    /// Run the Issue → Refresh → Reissue machine and return a 2xx response
    async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<Response> {
        let access_token = access_token.filter(|t| !t.is_empty());
        let mut step = Step::Issue;

        loop {
            step = match step {
                Step::Issue => {
                    let generation = self.refresh_generation.load(Ordering::Acquire);
                    let response = self.send(url, options, access_token).await?;
                    if access_token.is_some() && response.status() == StatusCode::UNAUTHORIZED {
                        debug!(url = %url, "Access token rejected, refreshing");
                        Step::Refresh { generation }
                    } else {
                        return ensure_success(response).await;
                    }
                }
                Step::Refresh { generation } => Step::Reissue {
                    token: self.refresh_after_rejection(generation).await?,
                },
                Step::Reissue { token } => {
                    let response = self.send(url, options, Some(&token)).await?;
                    if response.status() == StatusCode::UNAUTHORIZED {
                        warn!(url = %url, "Refreshed token rejected, clearing credentials");
                        self.store.clear()?;
                        return Err(Error::AuthExpired);
                    }
                    return ensure_success(response).await;
                }
            };
        }
    }

    async fn send(
        &self,
        url: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<Response> {
        let mut headers = options.headers.clone();
        if let Some(token) = access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                Error::Credentials("Access token is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let mut builder = self
            .http
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        builder.send().await.map_err(|e| {
            warn!(method = %options.method, url = %url, error = %e, "Request failed before a response");
            Error::Unreachable {
                url: url.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Obtain a new access token for a call issued at refresh `generation`.
    ///
    /// If a refresh completed after the call was issued (typically a
    /// concurrent call that hit the same `401`), its token is reused without
    /// a network call.
    async fn refresh_after_rejection(&self, generation: u64) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_generation.load(Ordering::Acquire) != generation {
            if let Some(current) = self.store.access_token()? {
                debug!("Access token already refreshed by a concurrent call");
                return Ok(current);
            }
        }
        self.refresh_locked().await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Without a refresh token the credential pair is destroyed and
    /// [`Error::AuthExpired`] returned without touching the network. A
    /// rejected refresh also destroys the pair and returns the backend's
    /// error.
    pub async fn refresh_access_token(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String> {
        let Some(refresh) = self.store.refresh_token()? else {
            warn!("No refresh token stored, clearing credentials");
            self.store.clear()?;
            return Err(Error::AuthExpired);
        };

        let url = self.url_for(REFRESH_PATH);
        let options = RequestOptions::json(Method::POST, &json!({ "refresh": refresh }))?;
        let response = self.send(&url, &options, None).await?;

        let response = match ensure_success(response).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh rejected, clearing credentials");
                self.store.clear()?;
                return Err(e);
            }
        };

        let refreshed: RefreshResponse = response.json().await.map_err(|e| Error::InvalidResponse {
            url,
            message: e.to_string(),
        })?;
        self.store.set_access_token(&refreshed.access)?;
        self.refresh_generation.fetch_add(1, Ordering::AcqRel);

        info!("Access token refreshed successfully");
        Ok(refreshed.access)
    }
}

/// Pass 2xx responses through, turn everything else into [`Error::Upstream`]
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text);
    debug!(status = %status, message = %message, "Request returned an error");
    Err(Error::Upstream { status, message })
}

/// `detail` of a JSON error body, else the JSON itself, else the raw text
fn error_message(body: &str) -> String {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
            Some(Value::Null | Value::String(_)) | None => value.to_string(),
            Some(detail) => detail.to_string(),
        },
        Err(_) => body.to_string(),
    };

    if message.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        message
    }
}

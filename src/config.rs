//! Configuration management

use std::{env, fmt, path::Path, path::PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Explicit internal backend override
pub const BACKEND_INTERNAL_URL: &str = "BACKEND_INTERNAL_URL";
/// Public API base override, as exported to the web frontend
pub const NEXT_PUBLIC_API_BASE: &str = "NEXT_PUBLIC_API_BASE";
/// Public API base override
pub const PUBLIC_API_BASE: &str = "PUBLIC_API_BASE";
/// Generic API base override
pub const API_BASE_URL: &str = "API_BASE_URL";
/// Set by the Railway platform on every deployment
pub const RAILWAY_ENVIRONMENT: &str = "RAILWAY_ENVIRONMENT";

/// Backend address on Railway's private network
pub const RAILWAY_INTERNAL_BACKEND: &str = "http://backend-web.railway.internal:8080";
/// Backend address when nothing else is configured (compose service name)
pub const FALLBACK_BACKEND: &str = "http://web:8000";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Gateway listener configuration
    pub server: ServerConfig,
    /// Backend the gateway forwards to
    pub backend: BackendConfig,
    /// API client configuration
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path prefix the gateway is mounted under
    pub mount: String,
    /// Maximum forwarded request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            mount: "/api/proxy".to_string(),
            max_body_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// Explicit backend origin; wins over every environment source
    pub url: Option<String>,
}

/// API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway URL including the mount prefix
    pub gateway_url: String,
    /// Credential file (default: `~/.resume-edge/credentials.json`)
    pub credentials_path: Option<PathBuf>,
    /// Filename used when a download carries no usable `Content-Disposition`
    pub default_filename: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:3000/api/proxy".to_string(),
            credentials_path: None,
            default_filename: "resume.pdf".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (RESUME_EDGE_ prefix)
        figment = figment.merge(Env::prefixed("RESUME_EDGE_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);
            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in URL settings
    fn expand_env_vars(&mut self) -> Result<()> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| Error::Internal(e.to_string()))?;

        if let Some(url) = self.backend.url.as_mut() {
            *url = expand_string(&re, url);
        }
        self.client.gateway_url = expand_string(&re, &self.client.gateway_url);
        Ok(())
    }

    /// Resolve the backend origin from this config and the process environment
    #[must_use]
    pub fn backend_base(&self) -> BackendBase {
        BackendBase::resolve(self.backend.url.as_deref(), |key| env::var(key).ok())
    }

    /// Credential file location, defaulting to the user's home directory
    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.client.credentials_path {
            return Ok(PathBuf::from(expand_home(&path.to_string_lossy())));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(".resume-edge").join("credentials.json"))
    }
}

/// Expand environment variables in a string
fn expand_string(re: &Regex, value: &str) -> String {
    re.replace_all(value, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map_or("", |m| m.as_str());
        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .into_owned()
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

/// Where a [`BackendBase`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSource {
    /// `backend.url` in the config file or `RESUME_EDGE_BACKEND__URL`
    Config,
    /// `BACKEND_INTERNAL_URL`
    InternalOverride,
    /// `NEXT_PUBLIC_API_BASE`
    NextPublicBase,
    /// `PUBLIC_API_BASE`
    PublicBase,
    /// `API_BASE_URL`
    ApiBase,
    /// Railway private network default
    Platform,
    /// Nothing configured
    Fallback,
}

impl fmt::Display for BackendSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::InternalOverride => BACKEND_INTERNAL_URL,
            Self::NextPublicBase => NEXT_PUBLIC_API_BASE,
            Self::PublicBase => PUBLIC_API_BASE,
            Self::ApiBase => API_BASE_URL,
            Self::Platform => RAILWAY_ENVIRONMENT,
            Self::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Backend origin without trailing slash, immutable once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendBase {
    url: String,
    source: BackendSource,
}

impl BackendBase {
    /// Resolve the backend origin.
    ///
    /// Candidates in order: `explicit`, `BACKEND_INTERNAL_URL`,
    /// `NEXT_PUBLIC_API_BASE`, `PUBLIC_API_BASE`, `API_BASE_URL`, the Railway internal address when
    /// `RAILWAY_ENVIRONMENT` is set, then `http://web:8000`. Empty values are
    /// skipped.
    pub fn resolve<F>(explicit: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let candidates = [
            (BackendSource::Config, non_empty(explicit.map(str::to_string))),
            (BackendSource::InternalOverride, non_empty(lookup(BACKEND_INTERNAL_URL))),
            (BackendSource::NextPublicBase, non_empty(lookup(NEXT_PUBLIC_API_BASE))),
            (BackendSource::PublicBase, non_empty(lookup(PUBLIC_API_BASE))),
            (BackendSource::ApiBase, non_empty(lookup(API_BASE_URL))),
        ];

        for (source, value) in candidates {
            if let Some(url) = value {
                return Self::new(&url, source);
            }
        }

        if non_empty(lookup(RAILWAY_ENVIRONMENT)).is_some() {
            return Self::new(RAILWAY_INTERNAL_BACKEND, BackendSource::Platform);
        }
        Self::new(FALLBACK_BACKEND, BackendSource::Fallback)
    }

    fn new(url: &str, source: BackendSource) -> Self {
        Self {
            url: url.trim().trim_end_matches('/').to_string(),
            source,
        }
    }

    /// Origin URL
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Which candidate won
    pub fn source(&self) -> BackendSource {
        self.source
    }
}

impl fmt::Display for BackendBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

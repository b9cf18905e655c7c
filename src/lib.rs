//! Resume edge library
//!
//! Edge request-forwarding layer for the resume builder.
//!
//! # Features
//!
//! - **Forwarding gateway**: same-origin endpoint that rewrites any request onto
//!   the backend's `/api/` tree, strips hop-by-hop headers in both directions,
//!   never follows redirects and streams response bodies through untouched
//! - **Resilient API client**: attaches bearer credentials, refreshes an expired
//!   access token and re-issues the failed request exactly once
//! - **Credential stores**: file-backed for the CLI, in-memory for embedding

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
        _ => subscriber.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}

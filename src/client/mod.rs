//! Resilient API client
//!
//! Attaches bearer credentials, refreshes an expired access token and retries
//! the rejected call once. Credentials come from an injected
//! [`CredentialStore`].

mod api;
mod credentials;
mod download;
mod session;

pub use api::{ApiClient, REFRESH_PATH, RequestOptions};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use download::{Download, filename_from_disposition};
pub use session::{LoginResponse, ShareLink, User};

//! API path normalization
//!
//! Callers address backend resources as `/api/...`. The gateway injects the
//! `/api/` segment itself, so the prefix is stripped before a path is appended
//! to the gateway URL; otherwise the backend would see `/api/api/...`.

/// Prefix used by callers for backend routes
pub const API_PREFIX: &str = "/api";

/// Strip a leading [`API_PREFIX`] segment.
///
/// Only a whole segment is stripped: `/api/auth/me` becomes `/auth/me`, `/api`
/// becomes `""`, but `/apis/x` is left untouched.
pub fn normalize_api_path(path: &str) -> &str {
    match path.strip_prefix(API_PREFIX) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => rest,
        _ => path,
    }
}

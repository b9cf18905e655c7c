//! Binary downloads

use std::sync::OnceLock;

use bytes::Bytes;
use regex::Regex;

/// Binary payload plus the filename the server suggested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Raw response body
    pub bytes: Bytes,
    /// Suggested filename, or the configured default
    pub filename: String,
}

/// Extract the quoted filename from a `Content-Disposition` value.
///
/// Only the `filename="..."` form is recognised; anything else yields `None`.
pub fn filename_from_disposition(value: &str) -> Option<&str> {
    static FILENAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = FILENAME_RE.get_or_init(|| {
        Regex::new(r#"(?i)filename="([^"]+)""#).expect("static regex is valid")
    });
    re.captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

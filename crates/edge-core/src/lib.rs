//! Resume edge core primitives
//!
//! Protocol-level types shared by the forwarding gateway and the API client:
//! the credential pair, the hop-by-hop header set, API path normalization and
//! the JSON error payloads both sides speak.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod headers;
pub mod path;
pub mod payload;

pub use credentials::CredentialPair;
pub use headers::{HOP_BY_HOP_HEADERS, is_hop_by_hop};
pub use path::{API_PREFIX, normalize_api_path};
pub use payload::{ErrorDetail, ProxyFailure};

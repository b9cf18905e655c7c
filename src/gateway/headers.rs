//! Hop-by-hop header filtering

use axum::http::HeaderMap;
use edge_core::is_hop_by_hop;

/// Copy `headers` without any hop-by-hop entry.
///
/// Repeated headers (e.g. `set-cookie`) keep every value.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

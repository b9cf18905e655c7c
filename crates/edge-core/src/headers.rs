//! Hop-by-hop header set
//!
//! These headers only describe one connection leg and must never cross the
//! gateway, neither on the forwarded request nor on the relayed response.

/// Lowercase names of headers that are dropped in both directions
pub const HOP_BY_HOP_HEADERS: [&str; 11] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "expect",
];

/// Case-insensitive membership test against [`HOP_BY_HOP_HEADERS`]
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_regardless_of_case() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(is_hop_by_hop("host"));
        assert!(is_hop_by_hop("Content-Length"));
    }

    #[test]
    fn end_to_end_headers_pass() {
        for name in ["authorization", "content-type", "cookie", "location", "set-cookie", "x-request-id"] {
            assert!(!is_hop_by_hop(name), "{name} must be forwarded");
        }
    }
}

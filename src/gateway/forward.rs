//! Request forwarding onto the backend origin
//!
//! Every incoming request is rewritten to `<backend>/api/<path>?<query>`,
//! stripped of hop-by-hop headers and sent without following redirects. The
//! backend response is relayed with its status, filtered headers and a body
//! that is streamed through untouched. A request that never reaches the
//! backend ends in a `502` carrying the resolved target URL.
//!
//! `.` and `..` segments (plain or percent-encoded) are refused with `400`:
//! URL resolution would otherwise move the target outside `/api/`.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use edge_core::{ErrorDetail, ProxyFailure};
use reqwest::{Client, redirect};
use tracing::{debug, warn};
use thiserror::Error as ThisError;
use url::Url;

use super::headers::strip_hop_by_hop;
use crate::config::BackendBase;
use crate::{Error, Result};

/// Why a forwarding target could not be built
#[derive(Debug, ThisError)]
pub enum TargetError {
    /// A dot segment would climb out of the `/api/` tree
    #[error("Path segment {0:?} is not allowed")]
    DotSegment(String),
    /// The joined URL does not parse
    #[error(transparent)]
    Parse(#[from] url::ParseError),
}

/// Forwards requests to a single backend origin
#[derive(Debug, Clone)]
pub struct Forwarder {
    /// HTTP client (redirects off, no transparent decompression)
    client: Client,
    /// Backend origin, resolved once at startup
    base: BackendBase,
    /// Upper bound for buffered request bodies
    max_body_size: usize,
}

impl Forwarder {
    /// Create a forwarder for `base`
    pub fn new(base: BackendBase, max_body_size: usize) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build forwarding client: {e}")))?;

        Ok(Self {
            client,
            base,
            max_body_size,
        })
    }

    /// Backend origin
    pub fn base(&self) -> &BackendBase {
        &self.base
    }

    /// `<base>/api/<segments joined by "/">`, before any query is applied
    pub fn target_path(&self, segments: &[&str]) -> String {
        format!("{}/api/{}", self.base, segments.join("/"))
    }

    /// Full target URL with the incoming query parameters applied.
    ///
    /// Parameters are set one by one: a repeated key keeps the position of
    /// its first occurrence and the value of its last one.
    pub fn target_url(
        &self,
        segments: &[&str],
        query: Option<&str>,
    ) -> std::result::Result<Url, TargetError> {
        if let Some(dot) = segments.iter().find(|segment| is_dot_segment(segment)) {
            return Err(TargetError::DotSegment((*dot).to_string()));
        }
        let mut url = Url::parse(&self.target_path(segments))?;

        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value.into_owned(),
                None => params.push((key.into_owned(), value.into_owned())),
            }
        }

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&params);
        }
        Ok(url)
    }

    /// Forward `request` to the backend under `segments`.
    ///
    /// Always produces a response: the relayed backend response, a `502`
    /// when the backend is unreachable or a `400` when the path holds a dot
    /// segment or the incoming body cannot be read.
    pub async fn forward(&self, request: Request, segments: &[&str]) -> Response {
        let (parts, body) = request.into_parts();

        let target = match self.target_url(segments, parts.uri.query()) {
            Ok(url) => url,
            Err(e @ TargetError::DotSegment(_)) => {
                warn!(path = %parts.uri.path(), error = %e, "Refusing dot segment");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorDetail {
                        detail: e.to_string(),
                    }),
                )
                    .into_response();
            }
            Err(e) => {
                let attempted = self.target_path(segments);
                warn!(target = %attempted, error = %e, "Invalid forwarding target");
                return proxy_failure(&attempted, e.to_string(), None);
            }
        };

        let body = if has_body(&parts.method) {
            match axum::body::to_bytes(body, self.max_body_size).await {
                Ok(bytes) => non_empty(bytes),
                Err(e) => {
                    warn!(method = %parts.method, target = %target, error = %e, "Failed to read request body");
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorDetail {
                            detail: format!("Failed to read request body: {e}"),
                        }),
                    )
                        .into_response();
                }
            }
        } else {
            None
        };

        debug!(
            method = %parts.method,
            target = %target,
            body_bytes = body.as_ref().map_or(0, Bytes::len),
            "Forwarding request"
        );

        let mut outgoing = self
            .client
            .request(parts.method.clone(), target.clone())
            .headers(strip_hop_by_hop(&parts.headers));
        if let Some(bytes) = body {
            outgoing = outgoing.body(bytes);
        }

        match outgoing.send().await {
            Ok(upstream) => {
                debug!(method = %parts.method, target = %target, status = %upstream.status(), "Relaying backend response");
                relay(upstream)
            }
            Err(e) => {
                let cause = std::error::Error::source(&e).map(ToString::to_string);
                warn!(method = %parts.method, target = %target, error = %e, "Backend unreachable");
                proxy_failure(target.as_str(), e.to_string(), cause)
            }
        }
    }
}

/// `.` or `..`, with any dot written as `%2e`
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// GET and HEAD never carry a body
fn has_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// A zero-length body is omitted rather than sent empty
fn non_empty(bytes: Bytes) -> Option<Bytes> {
    if bytes.is_empty() { None } else { Some(bytes) }
}

/// Relay status, filtered headers and the streamed body
fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn proxy_failure(target: &str, error: String, cause: Option<String>) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(ProxyFailure::new(target, error, cause)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(base: &str) -> Forwarder {
        Forwarder::new(BackendBase::resolve(Some(base), |_| None), 1024).unwrap()
    }

    #[test]
    fn target_joins_segments_under_api() {
        let fwd = forwarder("http://backend:8000/");
        let url = fwd.target_url(&["analyze", "42"], Some("x=1")).unwrap();
        assert_eq!(url.as_str(), "http://backend:8000/api/analyze/42?x=1");
    }

    #[test]
    fn empty_segments_still_target_api_root() {
        let fwd = forwarder("http://backend:8000");
        let url = fwd.target_url(&[], None).unwrap();
        assert_eq!(url.as_str(), "http://backend:8000/api/");
    }

    #[test]
    fn duplicate_query_keys_are_last_wins() {
        let fwd = forwarder("http://backend:8000");
        let url = fwd
            .target_url(&["resumes"], Some("page=1&q=cv&page=3"))
            .unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "3".to_string()),
                ("q".to_string(), "cv".to_string()),
            ]
        );
    }

    #[test]
    fn query_values_are_reencoded() {
        let fwd = forwarder("http://backend:8000");
        let url = fwd
            .target_url(&["share", "tok"], Some("name=Ada%20Lovelace&tag=a%26b"))
            .unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("name".to_string(), "Ada Lovelace".to_string()));
        assert_eq!(pairs[1], ("tag".to_string(), "a&b".to_string()));
    }

    #[test]
    fn dot_segments_cannot_leave_api_tree() {
        let fwd = forwarder("http://backend:8000");
        for segments in [
            &["..", "admin"][..],
            &["%2e%2e", "admin"][..],
            &["resumes", "%2E.", "admin"][..],
            &[".", "resumes"][..],
            &["%2e"][..],
        ] {
            let err = fwd.target_url(segments, None).unwrap_err();
            assert!(matches!(err, TargetError::DotSegment(_)), "{segments:?}");
        }

        let url = fwd.target_url(&["...", ".hidden", "a..b"], None).unwrap();
        assert_eq!(url.as_str(), "http://backend:8000/api/.../.hidden/a..b");
    }

    #[test]
    fn body_rules() {
        assert!(!has_body(&Method::GET));
        assert!(!has_body(&Method::HEAD));
        assert!(has_body(&Method::POST));
        assert!(has_body(&Method::OPTIONS));
        assert!(non_empty(Bytes::new()).is_none());
        assert_eq!(non_empty(Bytes::from_static(b"{}")), Some(Bytes::from_static(b"{}")));
    }
}

//! End-to-end forwarding tests
//!
//! A throwaway axum backend echoes what it received; the gateway runs in
//! front of it on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use edge_core::{HOP_BY_HOP_HEADERS, ProxyFailure};
use pretty_assertions::assert_eq;
use reqwest::{Client, Method, redirect};
use resume_edge::config::Config;
use resume_edge::gateway::Gateway;
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Start a gateway forwarding to `backend`; returns the gateway origin
async fn spawn_gateway(backend: &str) -> String {
    let mut config = Config::default();
    config.backend.url = Some(backend.to_string());
    let gateway = Gateway::new(config).unwrap();
    let addr = spawn(gateway.router()).await;
    format!("http://{addr}")
}

fn client() -> Client {
    Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

/// Echo method, path, query, headers and body as JSON
async fn echo(request: Request) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let headers: serde_json::Map<String, Value> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), json!(v.to_str().unwrap_or_default())))
        .collect();

    let mut response_headers = HeaderMap::new();
    response_headers.insert("x-backend", "echo".parse().unwrap());
    response_headers.insert("keep-alive", "timeout=5".parse().unwrap());
    response_headers.insert("proxy-authenticate", "Basic realm=\"edge\"".parse().unwrap());
    response_headers.insert("te", "trailers".parse().unwrap());
    response_headers.append(header::SET_COOKIE, "a=1".parse().unwrap());
    response_headers.append(header::SET_COOKIE, "b=2".parse().unwrap());

    (
        StatusCode::OK,
        response_headers,
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "headers": headers,
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

async fn echo_backend() -> String {
    let addr = spawn(Router::new().fallback(echo)).await;
    format!("http://{addr}")
}

#[tokio::test]
async fn get_is_rewritten_onto_backend_api() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    let response = client()
        .get(format!("{gateway}/api/proxy/analyze/42?x=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-backend"], "echo");

    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["path"], "/api/analyze/42");
    assert_eq!(echoed["query"], "x=1");
    assert_eq!(echoed["body"], "");
}

#[tokio::test]
async fn empty_path_targets_api_root() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    for path in ["/api/proxy", "/api/proxy/"] {
        let echoed: Value = client()
            .get(format!("{gateway}{path}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(echoed["path"], "/api/", "for {path}");
    }
}

#[tokio::test]
async fn duplicate_query_keys_resolve_to_last_value() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    let echoed: Value = client()
        .get(format!("{gateway}/api/proxy/resumes?page=1&q=cv&page=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["query"], "page=2&q=cv");
}

#[tokio::test]
async fn hop_by_hop_headers_never_cross_the_gateway() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    let response = client()
        .post(format!("{gateway}/api/proxy/resumes"))
        .header("authorization", "Bearer abc")
        .header("x-custom", "kept")
        .header("proxy-authorization", "Basic c2VjcmV0")
        .header("keep-alive", "timeout=5")
        .header("te", "trailers")
        .header("trailer", "x-checksum")
        .header("content-type", "application/json")
        .body(r#"{"title":"CV"}"#)
        .send()
        .await
        .unwrap();

    // Relayed response
    assert_eq!(response.status(), StatusCode::OK);
    for name in ["keep-alive", "proxy-authenticate", "te"] {
        assert!(!response.headers().contains_key(name), "{name} relayed to caller");
    }
    let cookies: Vec<_> = response.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies, ["a=1", "b=2"]);

    // Forwarded request
    let echoed: Value = response.json().await.unwrap();
    let headers = echoed["headers"].as_object().unwrap();
    assert_eq!(headers["authorization"], "Bearer abc");
    assert_eq!(headers["x-custom"], "kept");
    assert_eq!(headers["content-type"], "application/json");
    for name in ["proxy-authorization", "keep-alive", "te", "trailer", "expect", "connection"] {
        assert!(!headers.contains_key(name), "{name} forwarded to backend");
    }
    // The gateway's own connection leg sets the backend host
    let backend_host = backend.trim_start_matches("http://");
    assert_eq!(headers["host"], backend_host);
    assert_eq!(echoed["body"], r#"{"title":"CV"}"#);
}

#[test]
fn hop_by_hop_set_is_fixed() {
    assert_eq!(HOP_BY_HOP_HEADERS.len(), 11);
    assert!(HOP_BY_HOP_HEADERS.contains(&"expect"));
}

#[tokio::test]
async fn methods_pass_through_with_bodies() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS] {
        let echoed: Value = client()
            .request(method.clone(), format!("{gateway}/api/proxy/resumes/3"))
            .body("payload")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(echoed["method"], method.as_str());
        assert_eq!(echoed["path"], "/api/resumes/3");
        assert_eq!(echoed["body"], "payload");
    }
}

#[tokio::test]
async fn empty_body_is_not_forwarded() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    let echoed: Value = client()
        .post(format!("{gateway}/api/proxy/resumes/3/share"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["body"], "");
    assert!(echoed["headers"].get("transfer-encoding").is_none());
}

#[tokio::test]
async fn unsupported_method_is_rejected_locally() {
    let backend = echo_backend().await;
    let gateway = spawn_gateway(&backend).await;

    let response = client()
        .request(Method::TRACE, format!("{gateway}/api/proxy/resumes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn redirects_are_relayed_not_followed() {
    let followed = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&followed);
    let router = Router::new()
        .route(
            "/api/auth/sso",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/api/landing")]) }),
        )
        .route(
            "/api/landing",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "landed"
            }),
        )
        .with_state(hits);
    let backend = format!("http://{}", spawn(router).await);
    let gateway = spawn_gateway(&backend).await;

    let response = client()
        .get(format!("{gateway}/api/proxy/auth/sso"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/api/landing");
    assert_eq!(followed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn backend_status_and_large_body_are_relayed() {
    let payload: Vec<u8> = (0..2 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let body = Bytes::from(payload.clone());
    let router = Router::new().route(
        "/api/resumes/7/export",
        get(move || {
            let body = body.clone();
            async move {
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, "application/pdf"),
                        (header::CONTENT_DISPOSITION, "attachment; filename=\"resume.pdf\""),
                    ],
                    body,
                )
            }
        }),
    );
    let backend = format!("http://{}", spawn(router).await);
    let gateway = spawn_gateway(&backend).await;

    let response = client()
        .get(format!("{gateway}/api/proxy/resumes/7/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"resume.pdf\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), payload.as_slice());

    let missing = client()
        .get(format!("{gateway}/api/proxy/resumes/99"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreachable_backend_yields_502_with_target() {
    // Reserve a port, then free it so nothing listens there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let gateway = spawn_gateway(&format!("http://{dead}")).await;

    let response = client()
        .get(format!("{gateway}/api/proxy/analyze/42?x=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let failure: ProxyFailure = response.json().await.unwrap();
    assert_eq!(
        failure.detail,
        format!("Proxy request failed: http://{dead}/api/analyze/42?x=1")
    );
    assert!(!failure.error.is_empty());
}

#[tokio::test]
async fn health_is_served_locally() {
    let gateway = spawn_gateway("http://127.0.0.1:9").await;

    let health: Value = client()
        .get(format!("{gateway}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
}

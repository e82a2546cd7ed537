//! Router tests: health, cached assets, placeholder templating, forwarding.


use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use instant_proxy::server::CACHE_HEADER;
use instant_proxy::{create_router, AppState, CacheManifest, CacheStorage, ProxyResponse};
use test_helpers::{make_redb_test_state, make_test_state, start_upstream};

/// Call the router once, return (status, cache header, body).
async fn call(state: &AppState, method: &str, uri: &str) -> (StatusCode, Option<String>, String) {
    let app = create_router(state.clone());
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let source = resp
        .headers()
        .get(CACHE_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, source, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn test_health_reports_cache_version() {
    let upstream = start_upstream(&CacheManifest::default()).await;
    let (state, _storage) = make_test_state(&upstream.uri());

    let (status, _, body) = call(&state, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["cache_version"], "v2/");
}

#[tokio::test]
async fn test_installed_assets_served_from_cache() {
    let manifest = CacheManifest::default();
    let upstream = start_upstream(&manifest).await;
    let (state, _storage) = make_test_state(&upstream.uri());

    assert_eq!(state.proxy.on_install().await.unwrap(), manifest.assets.len());

    let (status, source, body) = call(&state, "GET", "/instant.min.js?9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("hit"));
    assert_eq!(body, "asset /instant.min.js?9");
}

#[tokio::test]
async fn test_search_page_uses_placeholder() {
    let manifest = CacheManifest::default();
    let upstream = start_upstream(&manifest).await;
    let (state, _storage) = make_test_state(&upstream.uri());
    state.proxy.on_install().await.unwrap();

    let (status, source, body) =
        call(&state, "GET", "/search?q=%3Cscript%3Ealert(1)%3C%2Fscript%3E").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("placeholder"));
    assert!(body.starts_with(
        "<title>&lt;script&gt;alert(1)&lt;&#x2F;script&gt; · Debian Code Search</title>"
    ));
    assert!(body.contains("/search?q=%3Cscript%3Ealert(1)%3C%2Fscript%3E"));
    assert!(!body.contains("<script>"));
}

#[tokio::test]
async fn test_search_without_cache_goes_upstream() {
    let manifest = CacheManifest::default();
    let upstream = start_upstream(&manifest).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("live search page"))
        .mount(&upstream)
        .await;
    let (state, _storage) = make_test_state(&upstream.uri());

    let (status, source, body) = call(&state, "GET", "/search?q=foo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("miss"));
    assert_eq!(body, "live search page");
}

#[tokio::test]
async fn test_other_requests_are_forwarded() {
    let manifest = CacheManifest::default();
    let upstream = start_upstream(&manifest).await;
    Mock::given(method("GET"))
        .and(path("/results/q1/page_0.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&upstream)
        .await;
    let (state, _storage) = make_test_state(&upstream.uri());

    let (status, source, body) = call(&state, "GET", "/results/q1/page_0.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(source.is_none());
    assert_eq!(body, "[]");

    let (status, source, _) = call(&state, "POST", "/search?q=foo").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(source.is_none());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Nothing listens on port 9 on loopback.
    let (state, _storage) = make_test_state("http://127.0.0.1:9");

    let (status, _, body) = call(&state, "GET", "/jquery.min.js").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("error"));
}

#[tokio::test]
async fn test_activate_after_upgrade_with_redb() {
    let manifest = CacheManifest::default();
    let upstream = start_upstream(&manifest).await;
    let (state, _dir) = make_redb_test_state(&upstream.uri());

    state.proxy.on_install().await.unwrap();
    let deleted = state.proxy.on_activate().unwrap();
    assert!(deleted.is_empty());

    // Served from the redb-backed cache.
    let (_, source, _) = call(&state, "GET", "/Roboto-Bold.woff2").await;
    assert_eq!(source.as_deref(), Some("hit"));
}

#[tokio::test]
async fn test_activate_removes_previous_version() {
    let manifest = CacheManifest::default();
    let upstream = start_upstream(&manifest).await;
    let (state, storage) = make_test_state(&upstream.uri());
    storage
        .put_all(
            "v1/assets",
            &[("/instant.min.js?8".to_string(), ProxyResponse::new(200, vec![], vec![]))],
        )
        .unwrap();
    state.proxy.on_install().await.unwrap();

    assert_eq!(state.proxy.on_activate().unwrap(), vec!["v1/assets"]);
    assert_eq!(storage.namespaces().unwrap(), vec!["v2/assets"]);
}

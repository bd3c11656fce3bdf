//! Failure-path tests: retry budgets, the asset fallback chain, and
//! upstream outages.

mod common;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use hubgate::config::ProfilesConfig;
use hubgate::http::{build_router, ProxyState};
use hubgate::routing::fallback;
use hubgate::upstream::{
    Profile, StatusPolicy, UpstreamClient, UpstreamError, UpstreamErrorKind,
};
use tower::ServiceExt;

use common::{base_config, start_mock_upstream};

fn fast_profiles() -> ProfilesConfig {
    let mut profiles = ProfilesConfig::default();
    for profile in [&mut profiles.default, &mut profiles.bulk, &mut profiles.r#static] {
        profile.base_delay_ms = 1;
        profile.max_delay_ms = 5;
    }
    profiles
}

fn not_found_error() -> UpstreamError {
    UpstreamError {
        kind: UpstreamErrorKind::Status,
        status: Some(404),
        excerpt: None,
    }
}

#[tokio::test]
async fn test_retry_budget_bounds_attempts() {
    let upstream =
        start_mock_upstream(|_| (500, "text/plain".to_string(), "boom".to_string())).await;
    let client = UpstreamClient::new(fast_profiles());

    let result = client
        .request(
            Profile::Default,
            Method::GET,
            &format!("{}/o/r", upstream.base_url()),
            &HeaderMap::new(),
            None,
            StatusPolicy::Standard,
            "raw",
        )
        .await;

    let error = result.unwrap_err();
    assert_eq!(error.status, Some(500));
    // default profile: 3 retries, so 4 attempts total
    assert_eq!(upstream.calls(), 4);
}

#[tokio::test]
async fn test_non_idempotent_methods_never_retry() {
    let upstream =
        start_mock_upstream(|_| (503, "text/plain".to_string(), "busy".to_string())).await;
    let client = UpstreamClient::new(fast_profiles());

    let result = client
        .request(
            Profile::Default,
            Method::POST,
            &format!("{}/o/r/issues", upstream.base_url()),
            &HeaderMap::new(),
            None,
            StatusPolicy::Standard,
            "api",
        )
        .await;

    assert!(result.is_err());
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_fallback_cycles_manifest_extensions() {
    let upstream = start_mock_upstream(|path| {
        if path.ends_with(".js") {
            (200, "text/javascript".to_string(), "manifest".to_string())
        } else {
            (404, "text/plain".to_string(), "missing".to_string())
        }
    })
    .await;
    let client = UpstreamClient::new(fast_profiles());

    let original = format!("{}/o/r/releases/expanded_assets/v1.json", upstream.base_url());
    let response = fallback::run(
        &client,
        &original,
        &HeaderMap::new(),
        "http://127.0.0.1:1",
        "fragment",
        not_found_error(),
    )
    .await
    .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], b"manifest");
    // .json already failed before the chain started; .js is the first alternate
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_fallback_reconstructs_raw_host_url() {
    let raw_host = start_mock_upstream(|path| {
        if path == "/o/r/download/v1/tool.zip" {
            (200, "application/octet-stream".to_string(), "asset".to_string())
        } else {
            (404, "text/plain".to_string(), "missing".to_string())
        }
    })
    .await;
    let client = UpstreamClient::new(fast_profiles());

    // not an expanded-assets URL: the chain goes straight to the raw host
    let response = fallback::run(
        &client,
        "http://127.0.0.1:1/o/r/releases/download/v1/tool.zip",
        &HeaderMap::new(),
        &raw_host.base_url(),
        "assets",
        not_found_error(),
    )
    .await
    .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], b"asset");
    assert_eq!(raw_host.calls(), 1);
}

#[tokio::test]
async fn test_fallback_exhaustion_returns_original_error() {
    let client = UpstreamClient::new(fast_profiles());

    let result = fallback::run(
        &client,
        "http://127.0.0.1:1/o/r/releases/expanded_assets/v1.json",
        &HeaderMap::new(),
        "http://127.0.0.1:1",
        "fragment",
        not_found_error(),
    )
    .await;

    let error = result.unwrap_err();
    assert_eq!(error.status, Some(404));
}

#[tokio::test]
async fn test_unreachable_upstream_maps_to_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(&dir);
    let router = build_router(ProxyState::from_config(config));

    let request = Request::builder().uri("/o/r").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_invalid_fragment_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(&dir);
    let router = build_router(ProxyState::from_config(config));

    let request = Request::builder()
        .uri("/fragment/notaurl")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

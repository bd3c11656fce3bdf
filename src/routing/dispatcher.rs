//! Central request pipeline.
//!
//! # Data Flow
//! ```text
//! handler (http/server.rs)
//!     → blacklist check (short-circuit, upstream never contacted)
//!     → cache lookup (hit responds immediately)
//!     → upstream call (profile retry budget; streamed for bulk routes)
//!     → asset fallback chain (fragment/assets on 404 or transport error)
//!     → body rewrite (HTML links, CSS hosts) → cache store
//!     → header rewrite (per request: CSP depends on the inbound host)
//!     → response
//! ```
//!
//! # Design Decisions
//! - The cache stores the rewritten body with the original upstream
//!   headers; header rewriting runs per response because the synthesized
//!   CSP embeds the per-request proxy origin
//! - The main site route accepts every upstream status and substitutes the
//!   local 404/403 pages; substituted pages are never cached
//! - Every completion, including errors, produces one metrics datapoint

use std::time::Instant;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use url::Url;

use crate::error::ProxyError;
use crate::http::ProxyState;
use crate::observability::metrics;
use crate::rewrite::{rewrite_headers, rewrite_html, RewriteContext};
use crate::routing::fallback;
use crate::routing::profile::{ResponseMode, RouteKind};
use crate::upstream::{UpstreamError, UpstreamErrorKind, UpstreamResponse};

/// Handle one proxied request end to end. Always produces a response; no
/// error escapes to the transport layer.
pub async fn dispatch(
    state: &ProxyState,
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: HeaderMap,
    body: Bytes,
    ctx: RewriteContext,
) -> Response {
    let start = Instant::now();
    let kind = RouteKind::match_path(path);
    let route = kind.as_str();
    let repository = crate::blacklist::extract_repo(path, kind);

    // Admin paths reach here only when the admin surface is disabled.
    if kind == RouteKind::Admin {
        let response = page_response(StatusCode::NOT_FOUND, &state.pages.not_found);
        metrics::record_request(route, method.as_str(), 404, repository.as_deref(), start);
        return response;
    }

    // The home page is local; the upstream front page is never proxied.
    if kind == RouteKind::Site && path == "/" && matches!(method, Method::GET | Method::HEAD) {
        let response = page_response(StatusCode::OK, &state.pages.home);
        metrics::record_request(route, method.as_str(), 200, repository.as_deref(), start);
        return response;
    }

    if let Some(verdict) = state.blacklist.check(path, kind) {
        metrics::record_blocked();
        let status = StatusCode::from_u16(verdict.status)
            .unwrap_or(StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);
        tracing::info!(
            path,
            repository = repository.as_deref().unwrap_or(""),
            status = verdict.status,
            message = %verdict.message,
            "Request blocked by policy"
        );
        let response = page_response(status, &state.pages.blocked);
        metrics::record_request(route, method.as_str(), status.as_u16(), repository.as_deref(), start);
        return response;
    }

    let result = proxy(state, kind, &method, path, query, &headers, body, &ctx).await;

    match result {
        Ok(response) => {
            metrics::record_request(
                route,
                method.as_str(),
                response.status().as_u16(),
                repository.as_deref(),
                start,
            );
            response
        }
        Err(e) => {
            tracing::warn!(path, route, error = %e, "Request failed");
            let response = e.into_response();
            metrics::record_request(
                route,
                method.as_str(),
                response.status().as_u16(),
                repository.as_deref(),
                start,
            );
            response
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn proxy(
    state: &ProxyState,
    kind: RouteKind,
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
    ctx: &RewriteContext,
) -> Result<Response, ProxyError> {
    let profile = state.routes.profile(kind);
    let route = kind.as_str();

    let url = match kind {
        RouteKind::Fragment => fragment_target(path, query)?,
        _ => profile.upstream_url(path, query),
    };

    let cacheable = state.config.cache.enabled
        && !profile.cache_ttl.is_zero()
        && matches!(*method, Method::GET | Method::HEAD);
    let cache_key = crate::cache::ResponseCache::key(route, method.as_str(), &url);

    if cacheable {
        if let Some(entry) = state.cache.get(&cache_key) {
            metrics::record_cache_hit(route);
            return Ok(cached_response(&entry, ctx, state));
        }
        metrics::record_cache_miss(route);
    }

    if profile.response_mode == ResponseMode::Streamed {
        let upstream = state
            .client
            .request_streamed(profile.call_profile, method.clone(), &url, headers, profile.status_policy, route)
            .await?;
        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let response_headers = rewrite_headers(upstream.headers(), ctx, &state.hosts);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        return Ok(response);
    }

    let request_body = if matches!(*method, Method::GET | Method::HEAD) {
        None
    } else {
        Some(body)
    };

    let upstream = match state
        .client
        .request(profile.call_profile, method.clone(), &url, headers, request_body, profile.status_policy, route)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) if fallback_eligible(kind, method, &e) => {
            let raw_base = &state.routes.profile(RouteKind::Raw).upstream_base;
            fallback::run(&state.client, &url, headers, raw_base, route, e).await?
        }
        Err(e) => return Err(e.into()),
    };

    // Main site: accept everything upstream sends, but substitute the local
    // pages for not-found and forbidden outcomes.
    if kind == RouteKind::Site {
        match upstream.status {
            404 => return Ok(page_response(StatusCode::NOT_FOUND, &state.pages.not_found)),
            403 => return Ok(page_response(StatusCode::FORBIDDEN, &state.pages.forbidden)),
            _ => {}
        }
    }

    let rewritten = rewrite_body(&upstream, &state.hosts);

    if cacheable && upstream.status < 400 {
        state.cache.set(
            cache_key,
            upstream.status,
            upstream.header_pairs(),
            rewritten.clone(),
            profile.cache_ttl,
        );
    }

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let response_headers = rewrite_headers(&upstream.headers, ctx, &state.hosts);

    let mut response = Response::new(Body::from(rewritten));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// The absolute upstream URL a fragment request carries in its path.
fn fragment_target(path: &str, query: Option<&str>) -> Result<String, ProxyError> {
    let embedded = path
        .strip_prefix("/fragment/")
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| ProxyError::BadFragment("missing target URL".to_string()))?;

    let raw = match query {
        Some(q) => format!("{embedded}?{q}"),
        None => embedded.to_string(),
    };
    let normalized = fallback::normalize_fragment_url(&raw);

    let parsed = Url::parse(&normalized)
        .map_err(|_| ProxyError::BadFragment(format!("not an absolute URL: {normalized}")))?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return Err(ProxyError::BadFragment(format!("unsupported target: {normalized}")));
    }
    Ok(normalized)
}

/// Whether a failed call should enter the asset fallback chain.
fn fallback_eligible(kind: RouteKind, method: &Method, error: &UpstreamError) -> bool {
    matches!(kind, RouteKind::Fragment | RouteKind::Assets)
        && *method == Method::GET
        && (error.is_not_found()
            || matches!(
                error.kind,
                UpstreamErrorKind::Timeout | UpstreamErrorKind::Connect | UpstreamErrorKind::Transport
            ))
}

/// Apply the body rewrites a response's content type calls for.
fn rewrite_body(upstream: &UpstreamResponse, hosts: &crate::rewrite::UpstreamHosts) -> Bytes {
    let content_type = upstream
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("text/html") {
        let text = String::from_utf8_lossy(&upstream.body);
        match rewrite_html(&text, hosts) {
            Ok(rewritten) => Bytes::from(rewritten),
            Err(e) => {
                tracing::warn!(error = %e, "HTML rewrite failed, serving original body");
                upstream.body.clone()
            }
        }
    } else if content_type.starts_with("text/css") {
        let text = String::from_utf8_lossy(&upstream.body);
        Bytes::from(hosts.rewrite_css(&text))
    } else {
        upstream.body.clone()
    }
}

/// Response rebuilt from a cache entry, with headers rewritten for this
/// request's origin.
fn cached_response(entry: &crate::cache::CacheEntry, ctx: &RewriteContext, state: &ProxyState) -> Response {
    let mut upstream_headers = HeaderMap::with_capacity(entry.headers.len());
    for (name, value) in &entry.headers {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            upstream_headers.append(name, value);
        }
    }
    let response_headers = rewrite_headers(&upstream_headers, ctx, &state.hosts);

    let mut response = Response::new(Body::from(entry.body.clone()));
    *response.status_mut() = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
    *response.headers_mut() = response_headers;
    response
}

fn page_response(status: StatusCode, html: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
        html.to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_target_requires_absolute_https() {
        assert_eq!(
            fragment_target("/fragment/https://cdn.x/o/r/info", None).unwrap(),
            "https://cdn.x/o/r/info"
        );
        // http targets are normalized up to https
        assert_eq!(
            fragment_target("/fragment/http://cdn.x/a", None).unwrap(),
            "https://cdn.x/a"
        );
        // query survives
        assert_eq!(
            fragment_target("/fragment/https://cdn.x/a", Some("v=2")).unwrap(),
            "https://cdn.x/a?v=2"
        );
        assert!(fragment_target("/fragment/", None).is_err());
        assert!(fragment_target("/fragment/notaurl", None).is_err());
    }

    #[test]
    fn test_fallback_eligibility() {
        let not_found = UpstreamError {
            kind: UpstreamErrorKind::Status,
            status: Some(404),
            excerpt: None,
        };
        let server_error = UpstreamError {
            kind: UpstreamErrorKind::Status,
            status: Some(500),
            excerpt: None,
        };
        let timeout = UpstreamError {
            kind: UpstreamErrorKind::Timeout,
            status: None,
            excerpt: None,
        };

        assert!(fallback_eligible(RouteKind::Fragment, &Method::GET, &not_found));
        assert!(fallback_eligible(RouteKind::Assets, &Method::GET, &timeout));
        assert!(!fallback_eligible(RouteKind::Assets, &Method::GET, &server_error));
        assert!(!fallback_eligible(RouteKind::Raw, &Method::GET, &not_found));
        assert!(!fallback_eligible(RouteKind::Fragment, &Method::POST, &not_found));
    }
}

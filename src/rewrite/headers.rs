//! Response header rewriting.
//!
//! Strips the upstream security policy (which names upstream hosts the
//! client must never contact), synthesizes a replacement scoped to the
//! proxy plus the fixed CDN allow-list, and rewrites `Location` so
//! redirects keep the client on the proxy.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::rewrite::hosts::UpstreamHosts;
use crate::rewrite::RewriteContext;

/// Headers never forwarded from upstream: hop-by-hop plus the security
/// headers we replace. Content-Length/-Encoding are dropped because the
/// body may change during rewriting and reqwest already decompressed it.
const STRIPPED: [&str; 10] = [
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "strict-transport-security",
];

fn is_stripped(name: &HeaderName) -> bool {
    STRIPPED.iter().any(|s| name.as_str().eq_ignore_ascii_case(s))
}

/// Build the replacement Content-Security-Policy for proxied pages.
fn synthesize_csp(ctx: &RewriteContext, hosts: &UpstreamHosts) -> String {
    let allowed = hosts.csp_allowed.join(" ");
    let origin = format!("{}://{}", ctx.scheme, ctx.proxy_host);
    format!(
        "default-src 'self' {origin}; \
         script-src 'self' 'unsafe-inline' 'unsafe-eval' {origin} {allowed}; \
         style-src 'self' 'unsafe-inline' {origin} {allowed}; \
         img-src 'self' data: blob: {allowed}; \
         font-src 'self' data: {allowed}; \
         connect-src 'self' {origin} {allowed}; \
         frame-src 'self'"
    )
}

/// Rewrite upstream response headers for delivery to the client.
pub fn rewrite_headers(
    upstream: &HeaderMap,
    ctx: &RewriteContext,
    hosts: &UpstreamHosts,
) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(upstream.len() + 4);

    for (name, value) in upstream.iter() {
        if is_stripped(name) {
            continue;
        }
        if name == axum::http::header::LOCATION {
            if let Ok(target) = value.to_str() {
                if let Some(rewritten) = hosts.rewrite_url(target) {
                    if let Ok(v) = HeaderValue::from_str(&rewritten) {
                        out.insert(axum::http::header::LOCATION, v);
                        continue;
                    }
                }
            }
        }
        out.append(name.clone(), value.clone());
    }

    if let Ok(csp) = HeaderValue::from_str(&synthesize_csp(ctx, hosts)) {
        out.insert(HeaderName::from_static("content-security-policy"), csp);
    }
    out.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    out.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    out.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("interest-cohort=()"),
    );

    out
}

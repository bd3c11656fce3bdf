//! Fragment/asset fallback orchestration.
//!
//! CDN-style asset URLs referenced by lazily-loaded page content 404
//! frequently: manifest paths lack their extension, and some assets only
//! exist on the raw-content host. When the initial call fails, this module
//! walks a bounded chain of alternates:
//!
//! 1. for "expanded assets" manifests, cycle the known extensions starting
//!    after the one just tried, one attempt each;
//! 2. reconstruct a raw-content URL (release-asset patterns map onto the
//!    raw host layout; anything else retries the same path there).
//!
//! Every stage is a single bounded-timeout call; stages never consume the
//! transport retry budget of the original request.

use axum::http::{HeaderMap, Method};
use url::Url;

use crate::observability::metrics;
use crate::upstream::{Profile, StatusPolicy, UpstreamClient, UpstreamError, UpstreamResponse};

/// Extension cycle for expanded-assets manifests, in fixed order.
pub const ALT_EXTENSIONS: [&str; 6] = [".json", ".js", ".ts", ".css", ".txt", ".md"];

/// Normalize an embedded fragment URL: force https, strip the trailing
/// slash, and give extension-less expanded-assets manifests a `.json`.
pub fn normalize_fragment_url(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if let Some(rest) = url.strip_prefix("http://") {
        url = format!("https://{rest}");
    }
    while url.ends_with('/') {
        url.pop();
    }
    if is_expanded_assets(&url) && current_extension(&url).is_none() {
        url.push_str(".json");
    }
    url
}

/// The "expanded assets" heuristic: release manifest paths fetched by
/// lazy-loading fragments.
pub fn is_expanded_assets(url: &str) -> bool {
    url.contains("/expanded_assets/")
}

/// The known extension the URL currently ends with, if any.
fn current_extension(url: &str) -> Option<&'static str> {
    ALT_EXTENSIONS.iter().find(|ext| url.ends_with(**ext)).copied()
}

/// Candidate URLs with alternate extensions, starting after the current
/// one in the fixed cycle order.
pub fn alternate_urls(url: &str) -> Vec<String> {
    let (stem, current) = match current_extension(url) {
        Some(ext) => (&url[..url.len() - ext.len()], ext),
        None => (url, ""),
    };
    let start = ALT_EXTENSIONS
        .iter()
        .position(|e| *e == current)
        .map(|i| i + 1)
        .unwrap_or(0);

    ALT_EXTENSIONS
        .iter()
        .cycle()
        .skip(start)
        .take(ALT_EXTENSIONS.len())
        .filter(|ext| **ext != current)
        .map(|ext| format!("{stem}{ext}"))
        .collect()
}

/// Reconstruct the asset's location on the raw-content host.
///
/// `/owner/repo/releases/{type}/{info}` maps to
/// `{raw}/owner/repo/{type}/{info}` (with `expanded_assets` folded to
/// `download`); any other path is retried as-is against the raw host.
pub fn raw_fallback_url(original: &str, raw_base: &str) -> Option<String> {
    let parsed = Url::parse(original).ok()?;
    let path = parsed.path();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [owner, repo, "releases", kind, rest @ ..] if !rest.is_empty() => {
            let kind = if *kind == "expanded_assets" { "download" } else { kind };
            Some(format!("{raw_base}/{owner}/{repo}/{kind}/{}", rest.join("/")))
        }
        _ => Some(format!("{raw_base}{path}")),
    }
}

/// Walk the fallback chain after the initial call failed with `error`.
pub async fn run(
    client: &UpstreamClient,
    original_url: &str,
    headers: &HeaderMap,
    raw_base: &str,
    route: &'static str,
    error: UpstreamError,
) -> Result<UpstreamResponse, UpstreamError> {
    if is_expanded_assets(original_url) {
        for candidate in alternate_urls(original_url) {
            metrics::record_fallback_attempt("extension");
            tracing::debug!(url = %candidate, "Trying alternate extension");
            if let Ok(response) = client
                .request_once(Profile::Static, Method::GET, &candidate, headers, StatusPolicy::Standard, route)
                .await
            {
                return Ok(response);
            }
        }
    }

    if let Some(raw_url) = raw_fallback_url(original_url, raw_base) {
        metrics::record_fallback_attempt("raw_host");
        tracing::debug!(url = %raw_url, "Trying raw-content host");
        if let Ok(response) = client
            .request_once(Profile::Static, Method::GET, &raw_url, headers, StatusPolicy::Standard, route)
            .await
        {
            return Ok(response);
        }
    }

    Err(error)
}

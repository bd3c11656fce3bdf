//! Outbound HTTP client with per-profile limits and retry.
//!
//! # Responsibilities
//! - One pre-built reqwest client per call profile (timeouts, connection reuse)
//! - Header normalization: random User-Agent, Accept defaults, upstream Host
//! - Explicit retry loop with capped exponential backoff + jitter
//! - Body-size caps while buffering; bounded error excerpts
//!
//! # Design Decisions
//! - Redirects are never followed: Location must reach the rewriter
//! - Transport errors always retryable; 5xx only for idempotent methods and
//!   only when the profile's status policy treats 5xx as an error
//! - The normalized error never carries the raw upstream payload, only a
//!   bounded excerpt for diagnostics

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderValue, Method};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use rand::seq::SliceRandom;

use crate::config::{CallProfileConfig, ProfilesConfig};
use crate::observability::metrics;
use crate::resilience::{calculate_backoff, is_retryable};
use crate::upstream::{Profile, StatusPolicy, UpstreamError, UpstreamErrorKind};

/// Fixed pool of realistic browser strings, one chosen per call when the
/// client did not supply its own.
const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (Version/17.5 Safari/605.1.15)",
];

/// Inbound headers never forwarded upstream. Host is re-derived from the
/// target URL; Accept-Encoding is owned by reqwest so decompression works.
const DROPPED_INBOUND: [&str; 6] = [
    "host",
    "connection",
    "content-length",
    "accept-encoding",
    "x-request-id",
    "x-forwarded-for",
];

/// Maximum bytes of upstream body copied into an error value.
const ERROR_EXCERPT_BYTES: usize = 256;

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub elapsed: Duration,
}

impl UpstreamResponse {
    /// Header pairs in string form, the shape the cache stores.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect()
    }
}

/// Outbound client holding one reqwest client per profile.
#[derive(Clone)]
pub struct UpstreamClient {
    default_client: reqwest::Client,
    bulk_client: reqwest::Client,
    static_client: reqwest::Client,
    profiles: ProfilesConfig,
}

fn build_client(profile: &CallProfileConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(profile.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(Duration::from_secs(60))
        .build()
        .expect("reqwest client construction cannot fail with static options")
}

impl UpstreamClient {
    pub fn new(profiles: ProfilesConfig) -> Self {
        Self {
            default_client: build_client(&profiles.default),
            bulk_client: build_client(&profiles.bulk),
            static_client: build_client(&profiles.r#static),
            profiles,
        }
    }

    fn client_for(&self, profile: Profile) -> &reqwest::Client {
        match profile {
            Profile::Default => &self.default_client,
            Profile::Bulk => &self.bulk_client,
            Profile::Static => &self.static_client,
        }
    }

    pub fn profile_config(&self, profile: Profile) -> &CallProfileConfig {
        match profile {
            Profile::Default => &self.profiles.default,
            Profile::Bulk => &self.profiles.bulk,
            Profile::Static => &self.profiles.r#static,
        }
    }

    /// Outbound header set: the inbound headers minus proxy-specific ones,
    /// with User-Agent and Accept defaults filled in.
    fn prepare_headers(inbound: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::with_capacity(inbound.len() + 2);
        for (name, value) in inbound.iter() {
            if DROPPED_INBOUND.iter().any(|d| name.as_str().eq_ignore_ascii_case(d)) {
                continue;
            }
            out.append(name.clone(), value.clone());
        }

        if !out.contains_key(axum::http::header::USER_AGENT) {
            let ua = USER_AGENTS
                .choose(&mut rand::thread_rng())
                .expect("pool is non-empty");
            out.insert(axum::http::header::USER_AGENT, HeaderValue::from_static(ua));
        }
        if !out.contains_key(axum::http::header::ACCEPT) {
            out.insert(axum::http::header::ACCEPT, HeaderValue::from_static("*/*"));
        }
        out
    }

    /// Issue a buffered call with the profile's retry budget.
    pub async fn request(
        &self,
        profile: Profile,
        method: Method,
        url: &str,
        inbound_headers: &HeaderMap,
        body: Option<Bytes>,
        policy: StatusPolicy,
        route: &'static str,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let max_attempts = self.profile_config(profile).retries + 1;
        self.request_with_attempts(profile, method, url, inbound_headers, body, policy, route, max_attempts)
            .await
    }

    /// Single bounded attempt, used by the asset fallback chain so its
    /// stages never consume the transport retry budget.
    pub async fn request_once(
        &self,
        profile: Profile,
        method: Method,
        url: &str,
        inbound_headers: &HeaderMap,
        policy: StatusPolicy,
        route: &'static str,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.request_with_attempts(profile, method, url, inbound_headers, None, policy, route, 1)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn request_with_attempts(
        &self,
        profile: Profile,
        method: Method,
        url: &str,
        inbound_headers: &HeaderMap,
        body: Option<Bytes>,
        policy: StatusPolicy,
        route: &'static str,
        max_attempts: u32,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let config = self.profile_config(profile).clone();
        let client = self.client_for(profile).clone();
        let headers = Self::prepare_headers(inbound_headers);
        let start = Instant::now();

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut builder = client
                .request(method.clone(), url)
                .headers(headers.clone());
            if let Some(bytes) = &body {
                builder = builder.body(bytes.clone());
            }

            let (status, detail): (Option<u16>, Option<String>) = match builder.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if policy.is_success(status) {
                        let response_headers = response.headers().clone();
                        let body = collect_body(response, config.max_body_bytes).await?;
                        return Ok(UpstreamResponse {
                            status,
                            headers: response_headers,
                            body,
                            elapsed: start.elapsed(),
                        });
                    }
                    (Some(status), excerpt_of(response).await)
                }
                Err(e) => (None, Some(classify(&e))),
            };
            let transport_error = status.is_none();

            if attempt < max_attempts && is_retryable(&method, status, transport_error) {
                let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                metrics::record_retry(route);
                tracing::info!(
                    url,
                    attempt,
                    status = status.unwrap_or(0),
                    delay_ms = delay.as_millis() as u64,
                    "Retrying upstream call"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(match (status, detail) {
                (Some(s), excerpt) => UpstreamError {
                    kind: UpstreamErrorKind::Status,
                    status: Some(s),
                    excerpt,
                },
                (None, detail) => UpstreamError {
                    kind: detail
                        .as_deref()
                        .map(kind_from_detail)
                        .unwrap_or(UpstreamErrorKind::Transport),
                    status: None,
                    excerpt: detail,
                },
            });
        }
    }

    /// Issue a streamed call. Only transport errors before the response
    /// headers arrive are retried; the body is piped through untouched.
    pub async fn request_streamed(
        &self,
        profile: Profile,
        method: Method,
        url: &str,
        inbound_headers: &HeaderMap,
        policy: StatusPolicy,
        route: &'static str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let config = self.profile_config(profile).clone();
        let client = self.client_for(profile).clone();
        let headers = Self::prepare_headers(inbound_headers);
        let max_attempts = config.retries + 1;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match client.request(method.clone(), url).headers(headers.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if policy.is_success(status) {
                        return Ok(response);
                    }
                    let excerpt = excerpt_of(response).await;
                    if attempt < max_attempts && is_retryable(&method, Some(status), false) {
                        let delay =
                            calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                        metrics::record_retry(route);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(UpstreamError {
                        kind: UpstreamErrorKind::Status,
                        status: Some(status),
                        excerpt,
                    });
                }
                Err(e) => {
                    if attempt < max_attempts && is_retryable(&method, None, true) {
                        let delay =
                            calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                        metrics::record_retry(route);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let detail = classify(&e);
                    return Err(UpstreamError {
                        kind: kind_from_detail(&detail),
                        status: None,
                        excerpt: Some(detail),
                    });
                }
            }
        }
    }
}

/// Collect a response body, enforcing the profile's byte cap.
async fn collect_body(response: reqwest::Response, cap: usize) -> Result<Bytes, UpstreamError> {
    if let Some(len) = response.content_length() {
        if len as usize > cap {
            return Err(UpstreamError {
                kind: UpstreamErrorKind::TooLarge,
                status: Some(response.status().as_u16()),
                excerpt: None,
            });
        }
    }

    let mut collected = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UpstreamError {
            kind: kind_from_detail(&classify(&e)),
            status: None,
            excerpt: Some(classify(&e)),
        })?;
        if collected.len() + chunk.len() > cap {
            return Err(UpstreamError {
                kind: UpstreamErrorKind::TooLarge,
                status: None,
                excerpt: None,
            });
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(collected.freeze())
}

/// Bounded body excerpt for diagnostics; never the raw payload.
async fn excerpt_of(response: reqwest::Response) -> Option<String> {
    let bytes = response.bytes().await.ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let excerpt: String = text.chars().take(ERROR_EXCERPT_BYTES).collect();
    if excerpt.is_empty() {
        None
    } else {
        Some(excerpt)
    }
}

fn classify(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "timeout".to_string()
    } else if e.is_connect() {
        "connect".to_string()
    } else {
        format!("transport: {e}")
    }
}

fn kind_from_detail(detail: &str) -> UpstreamErrorKind {
    if detail.starts_with("timeout") {
        UpstreamErrorKind::Timeout
    } else if detail.starts_with("connect") {
        UpstreamErrorKind::Connect
    } else {
        UpstreamErrorKind::Transport
    }
}

//! Upstream call subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher
//!     → client.rs (profile selection, header normalization, retry loop)
//!     → upstream host over HTTPS
//!     → UpstreamResponse (buffered) or reqwest::Response (streamed)
//! ```

pub mod client;

use axum::http::StatusCode;

pub use client::{UpstreamClient, UpstreamResponse};

/// Which pre-built client configuration a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// 30s timeout, 50MB cap, 3 retries: pages, API, raw, fragments.
    Default,
    /// 180s timeout, 500MB cap, 1 retry: archives and release downloads.
    Bulk,
    /// 20s timeout, 10MB cap, 4 retries: theme/asset files.
    Static,
}

/// Which status codes a route treats as success (forwarded to the caller)
/// versus error (eligible for retry/fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Every status is a response worth forwarding; the dispatcher decides
    /// about page substitution (main site route).
    AcceptAll,
    /// 4xx bodies are forwarded verbatim, 5xx is an error (API route).
    AcceptUnder500,
    /// Only 2xx/3xx succeed (assets, fragments, raw).
    Standard,
}

impl StatusPolicy {
    pub fn is_success(self, status: u16) -> bool {
        match self {
            StatusPolicy::AcceptAll => true,
            StatusPolicy::AcceptUnder500 => status < 500,
            StatusPolicy::Standard => status < 400,
        }
    }
}

/// Kind of a normalized upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Timeout,
    Connect,
    Status,
    TooLarge,
    Transport,
}

/// Normalized upstream error: code, upstream status when one was received,
/// and a bounded body excerpt. Never carries the raw error payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("upstream {kind:?} (status {status:?})")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub status: Option<u16>,
    pub excerpt: Option<String>,
}

impl UpstreamError {
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            UpstreamErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            UpstreamErrorKind::Connect
            | UpstreamErrorKind::Transport
            | UpstreamErrorKind::Status
            | UpstreamErrorKind::TooLarge => StatusCode::BAD_GATEWAY,
        }
    }

    /// True for 404-class outcomes that the asset fallback chain handles.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

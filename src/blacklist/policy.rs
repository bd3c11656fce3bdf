//! Blacklist policy document and its compiled snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Response returned for blocked requests.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        Self {
            status_code: 451,
            message: "This repository is unavailable on this mirror.".to_string(),
        }
    }
}

/// On-disk JSON policy document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BlacklistPolicy {
    pub enabled: bool,

    /// Blocked repositories as "owner/repo" (compared lowercased).
    pub repositories: Vec<String>,

    /// Substrings matched against the full request path (lowercased).
    pub keywords: Vec<String>,

    /// "owner/repo" entries that are always allowed, overriding everything.
    pub whitelist_repositories: Vec<String>,

    /// Log each blocked request.
    pub log_blocked: bool,

    pub error_response: ErrorResponse,
}

impl Default for BlacklistPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            repositories: Vec::new(),
            keywords: Vec::new(),
            whitelist_repositories: Vec::new(),
            log_blocked: true,
            error_response: ErrorResponse::default(),
        }
    }
}

/// Immutable, lowercased form of the policy evaluated per request.
/// Swapped atomically on reload; readers always see a fully-formed snapshot.
#[derive(Debug, Default)]
pub struct PolicySnapshot {
    pub enabled: bool,
    pub repositories: HashSet<String>,
    pub keywords: Vec<String>,
    pub whitelist: HashSet<String>,
    pub log_blocked: bool,
    pub status_code: u16,
    pub message: String,
    /// The source document, kept for the admin surface.
    pub source: BlacklistPolicy,
}

impl PolicySnapshot {
    pub fn compile(policy: BlacklistPolicy) -> Self {
        Self {
            enabled: policy.enabled,
            repositories: policy.repositories.iter().map(|r| r.to_lowercase()).collect(),
            keywords: policy.keywords.iter().map(|k| k.to_lowercase()).collect(),
            whitelist: policy
                .whitelist_repositories
                .iter()
                .map(|r| r.to_lowercase())
                .collect(),
            log_blocked: policy.log_blocked,
            status_code: policy.error_response.status_code,
            message: policy.error_response.message.clone(),
            source: policy,
        }
    }

    /// Safe default used when no policy file was ever loaded successfully.
    pub fn disabled() -> Self {
        Self::compile(BlacklistPolicy::default())
    }
}

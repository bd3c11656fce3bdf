//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check upstream base URLs are absolute http(s) URLs without paths
//! - Validate value ranges (timeouts > 0, poll interval > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::{CallProfileConfig, ProxyConfig};

/// A single semantic validation failure.
#[derive(Debug, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

fn check_base_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(ValidationError {
                    field,
                    reason: format!("scheme must be http or https, got {}", url.scheme()),
                });
            }
            if url.path() != "/" && !url.path().is_empty() {
                errors.push(ValidationError {
                    field,
                    reason: "base URL must not carry a path".to_string(),
                });
            }
        }
        Err(e) => errors.push(ValidationError {
            field,
            reason: format!("invalid URL: {e}"),
        }),
    }
}

fn check_profile(field: &'static str, profile: &CallProfileConfig, errors: &mut Vec<ValidationError>) {
    if profile.timeout_secs == 0 {
        errors.push(ValidationError {
            field,
            reason: "timeout_secs must be greater than zero".to_string(),
        });
    }
    if profile.max_body_bytes == 0 {
        errors.push(ValidationError {
            field,
            reason: "max_body_bytes must be greater than zero".to_string(),
        });
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_base_url("upstreams.site", &config.upstreams.site, &mut errors);
    check_base_url("upstreams.api", &config.upstreams.api, &mut errors);
    check_base_url("upstreams.raw", &config.upstreams.raw, &mut errors);
    check_base_url("upstreams.assets", &config.upstreams.assets, &mut errors);
    check_base_url("upstreams.releases", &config.upstreams.releases, &mut errors);
    check_base_url("upstreams.codeload", &config.upstreams.codeload, &mut errors);

    check_profile("profiles.default", &config.profiles.default, &mut errors);
    check_profile("profiles.bulk", &config.profiles.bulk, &mut errors);
    check_profile("profiles.static", &config.profiles.r#static, &mut errors);

    if config.blacklist.poll_interval_secs == 0 {
        errors.push(ValidationError {
            field: "blacklist.poll_interval_secs",
            reason: "poll interval must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! Upstream base URLs and route TTLs are fixed at startup and immutable
//! for the process lifetime; only the blacklist policy file is hot-reloaded.

use serde::{Deserialize, Serialize};

/// Root configuration for the mirror proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Upstream base URLs for each mirrored surface.
    pub upstreams: UpstreamConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Per-profile upstream call settings.
    pub profiles: ProfilesConfig,

    /// Blacklist policy file settings.
    pub blacklist: BlacklistFileConfig,

    /// Custom page file paths.
    pub pages: PagesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Base URLs for the six mirrored upstream surfaces.
///
/// Each surface maps to one proxy path prefix; the rewriter uses the same
/// table in reverse to turn absolute upstream references into proxy paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Main site (HTML pages).
    pub site: String,

    /// REST API host.
    pub api: String,

    /// Raw file content host.
    pub raw: String,

    /// Static asset / theme host.
    pub assets: String,

    /// Release asset (object storage) host.
    pub releases: String,

    /// Archive download host.
    pub codeload: String,

    /// Extra hosts allowed in the synthesized CSP (avatars, camo, ...).
    pub csp_allowed_hosts: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            site: "https://github.com".to_string(),
            api: "https://api.github.com".to_string(),
            raw: "https://raw.githubusercontent.com".to_string(),
            assets: "https://github.githubassets.com".to_string(),
            releases: "https://objects.githubusercontent.com".to_string(),
            codeload: "https://codeload.github.com".to_string(),
            csp_allowed_hosts: vec![
                "avatars.githubusercontent.com".to_string(),
                "camo.githubusercontent.com".to_string(),
                "user-images.githubusercontent.com".to_string(),
                "private-user-images.githubusercontent.com".to_string(),
                "github.githubassets.com".to_string(),
                "raw.githubusercontent.com".to_string(),
            ],
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the in-memory response cache.
    pub enabled: bool,

    /// TTL for dynamic content (site HTML, API responses) in seconds.
    pub dynamic_ttl_secs: u64,

    /// TTL for static content (raw files, assets, fragments) in seconds.
    pub static_ttl_secs: u64,

    /// Sweep interval for expired entries in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dynamic_ttl_secs: 3600,
            static_ttl_secs: 86_400,
            sweep_interval_secs: 600,
        }
    }
}

/// Settings for one upstream call profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallProfileConfig {
    /// Total request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum buffered response body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum number of retry attempts after the initial call.
    pub retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

/// The three upstream call profiles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Default profile: site pages, API, raw files, fragments.
    pub default: CallProfileConfig,

    /// Bulk profile: release archives and codeload downloads (streamed).
    pub bulk: CallProfileConfig,

    /// Static profile: theme and asset files.
    pub r#static: CallProfileConfig,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            default: CallProfileConfig {
                timeout_secs: 30,
                max_body_bytes: 50 * 1024 * 1024,
                retries: 3,
                base_delay_ms: 100,
                max_delay_ms: 2000,
            },
            bulk: CallProfileConfig {
                timeout_secs: 180,
                max_body_bytes: 500 * 1024 * 1024,
                retries: 1,
                base_delay_ms: 250,
                max_delay_ms: 2000,
            },
            r#static: CallProfileConfig {
                timeout_secs: 20,
                max_body_bytes: 10 * 1024 * 1024,
                retries: 4,
                base_delay_ms: 100,
                max_delay_ms: 2000,
            },
        }
    }
}

/// Blacklist policy file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlacklistFileConfig {
    /// Path to the JSON policy file. Auto-created with defaults if missing.
    pub path: String,

    /// File poll interval in seconds.
    pub poll_interval_secs: u64,
}

impl Default for BlacklistFileConfig {
    fn default() -> Self {
        Self {
            path: "blacklist.json".to_string(),
            poll_interval_secs: 30,
        }
    }
}

/// Custom page file paths. Embedded defaults are used when a file is absent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PagesConfig {
    pub home: String,
    pub not_found: String,
    pub forbidden: String,
    pub blocked: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            home: "pages/home.html".to_string(),
            not_found: "pages/404.html".to_string(),
            forbidden: "pages/403.html".to_string(),
            blocked: "pages/451.html".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

//! Route profiles and path-prefix dispatch.
//!
//! # Responsibilities
//! - Map a request path to exactly one route kind (first match wins,
//!   longest-prefix order)
//! - Carry the static per-route parameters: upstream base, cache TTL,
//!   response mode, status policy, call profile
//!
//! # Design Decisions
//! - No regex: plain prefix checks keep matching O(path length)
//! - Profiles are built once from config and never change at runtime

use std::time::Duration;

use crate::config::ProxyConfig;
use crate::upstream::{Profile, StatusPolicy};

/// The mirrored surface a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Admin,
    Api,
    Raw,
    Releases,
    Assets,
    Codeload,
    Fragment,
    Site,
}

/// Prefixes checked in order; anything unmatched is the default site route.
const PREFIX_TABLE: [(&str, RouteKind); 7] = [
    ("/admin", RouteKind::Admin),
    ("/api", RouteKind::Api),
    ("/raw", RouteKind::Raw),
    ("/releases", RouteKind::Releases),
    ("/assets", RouteKind::Assets),
    ("/codeload", RouteKind::Codeload),
    ("/fragment", RouteKind::Fragment),
];

impl RouteKind {
    /// Select the route for a path. First match wins.
    pub fn match_path(path: &str) -> RouteKind {
        for (prefix, kind) in PREFIX_TABLE {
            if path == prefix || path.starts_with(&format!("{prefix}/")) {
                return kind;
            }
        }
        RouteKind::Site
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Admin => "admin",
            RouteKind::Api => "api",
            RouteKind::Raw => "raw",
            RouteKind::Releases => "releases",
            RouteKind::Assets => "assets",
            RouteKind::Codeload => "codeload",
            RouteKind::Fragment => "fragment",
            RouteKind::Site => "site",
        }
    }

    /// Proxy prefix stripped before the path is appended to the upstream
    /// base. The site route forwards the path unchanged.
    fn stripped_prefix(self) -> Option<&'static str> {
        match self {
            RouteKind::Api => Some("/api"),
            RouteKind::Raw => Some("/raw"),
            RouteKind::Releases => Some("/releases"),
            RouteKind::Assets => Some("/assets"),
            RouteKind::Codeload => Some("/codeload"),
            _ => None,
        }
    }
}

/// How a route's responses travel back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Body buffered in memory, eligible for rewriting and caching.
    Buffered,
    /// Body piped through without buffering; never cached.
    Streamed,
}

/// Static configuration for one route kind.
#[derive(Debug, Clone)]
pub struct RouteProfile {
    pub kind: RouteKind,
    pub upstream_base: String,
    pub cache_ttl: Duration,
    pub response_mode: ResponseMode,
    pub status_policy: StatusPolicy,
    pub call_profile: Profile,
}

impl RouteProfile {
    /// Absolute upstream URL for a request path (prefix stripped) and
    /// optional query string.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let rest = match self.kind.stripped_prefix() {
            Some(prefix) => {
                let stripped = path.strip_prefix(prefix).unwrap_or(path);
                if stripped.is_empty() {
                    "/"
                } else {
                    stripped
                }
            }
            None => path,
        };
        match query {
            Some(q) => format!("{}{}?{}", self.upstream_base, rest, q),
            None => format!("{}{}", self.upstream_base, rest),
        }
    }
}

/// The full static route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    site: RouteProfile,
    api: RouteProfile,
    raw: RouteProfile,
    releases: RouteProfile,
    assets: RouteProfile,
    codeload: RouteProfile,
    fragment: RouteProfile,
}

impl RouteTable {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let dynamic_ttl = Duration::from_secs(config.cache.dynamic_ttl_secs);
        let static_ttl = Duration::from_secs(config.cache.static_ttl_secs);
        let base = |s: &str| s.trim_end_matches('/').to_string();

        Self {
            site: RouteProfile {
                kind: RouteKind::Site,
                upstream_base: base(&config.upstreams.site),
                cache_ttl: dynamic_ttl,
                response_mode: ResponseMode::Buffered,
                status_policy: StatusPolicy::AcceptAll,
                call_profile: Profile::Default,
            },
            api: RouteProfile {
                kind: RouteKind::Api,
                upstream_base: base(&config.upstreams.api),
                cache_ttl: dynamic_ttl,
                response_mode: ResponseMode::Buffered,
                status_policy: StatusPolicy::AcceptUnder500,
                call_profile: Profile::Default,
            },
            raw: RouteProfile {
                kind: RouteKind::Raw,
                upstream_base: base(&config.upstreams.raw),
                cache_ttl: static_ttl,
                response_mode: ResponseMode::Buffered,
                status_policy: StatusPolicy::AcceptUnder500,
                call_profile: Profile::Default,
            },
            releases: RouteProfile {
                kind: RouteKind::Releases,
                upstream_base: base(&config.upstreams.releases),
                cache_ttl: Duration::ZERO,
                response_mode: ResponseMode::Streamed,
                status_policy: StatusPolicy::Standard,
                call_profile: Profile::Bulk,
            },
            assets: RouteProfile {
                kind: RouteKind::Assets,
                upstream_base: base(&config.upstreams.assets),
                cache_ttl: static_ttl,
                response_mode: ResponseMode::Buffered,
                status_policy: StatusPolicy::Standard,
                call_profile: Profile::Static,
            },
            codeload: RouteProfile {
                kind: RouteKind::Codeload,
                upstream_base: base(&config.upstreams.codeload),
                cache_ttl: Duration::ZERO,
                response_mode: ResponseMode::Streamed,
                status_policy: StatusPolicy::Standard,
                call_profile: Profile::Bulk,
            },
            fragment: RouteProfile {
                kind: RouteKind::Fragment,
                // Fragments embed their own absolute target URL.
                upstream_base: String::new(),
                cache_ttl: static_ttl,
                response_mode: ResponseMode::Buffered,
                status_policy: StatusPolicy::Standard,
                call_profile: Profile::Static,
            },
        }
    }

    pub fn profile(&self, kind: RouteKind) -> &RouteProfile {
        match kind {
            RouteKind::Site | RouteKind::Admin => &self.site,
            RouteKind::Api => &self.api,
            RouteKind::Raw => &self.raw,
            RouteKind::Releases => &self.releases,
            RouteKind::Assets => &self.assets,
            RouteKind::Codeload => &self.codeload,
            RouteKind::Fragment => &self.fragment,
        }
    }
}

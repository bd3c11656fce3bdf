//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP accept (tokio, task per connection)
//!     → middleware (request id, trace, body limit, concurrency limit)
//!     → catch-all handler → routing::dispatch
//!     → admin router (/admin, when enabled)
//! ```

pub mod server;

use std::sync::Arc;
use std::time::Instant;

use crate::blacklist::BlacklistFilter;
use crate::cache::ResponseCache;
use crate::config::ProxyConfig;
use crate::pages::Pages;
use crate::rewrite::UpstreamHosts;
use crate::routing::RouteTable;
use crate::upstream::UpstreamClient;

pub use server::{build_router, run};

/// Shared state handed to every handler. Everything inside is cheap to
/// clone; per-request work never mutates it except through the cache and
/// blacklist interior types.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub routes: Arc<RouteTable>,
    pub client: UpstreamClient,
    pub cache: ResponseCache,
    pub blacklist: Arc<BlacklistFilter>,
    pub hosts: Arc<UpstreamHosts>,
    pub pages: Pages,
    pub started_at: Instant,
}

impl ProxyState {
    pub fn from_config(config: ProxyConfig) -> Self {
        let routes = Arc::new(RouteTable::from_config(&config));
        let client = UpstreamClient::new(config.profiles.clone());
        let blacklist = Arc::new(BlacklistFilter::load_or_default(&config.blacklist.path));
        let hosts = Arc::new(UpstreamHosts::from_config(&config.upstreams));
        let pages = Pages::load(&config.pages);

        Self {
            config: Arc::new(config),
            routes,
            client,
            cache: ResponseCache::new(),
            blacklist,
            hosts,
            pages,
            started_at: Instant::now(),
        }
    }
}

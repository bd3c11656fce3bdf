use axum::{extract::State, Json};
use serde::Serialize;

use crate::blacklist::BlacklistPolicy;
use crate::cache::{CacheStats, ClearSummary};
use crate::http::ProxyState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub cache_entries: usize,
    pub blacklist_enabled: bool,
    pub blacklist_repositories: usize,
    pub blacklist_verdicts_cached: usize,
}

pub async fn get_status(State(state): State<ProxyState>) -> Json<SystemStatus> {
    let snapshot = state.blacklist.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        cache_entries: state.cache.stats().entries,
        blacklist_enabled: snapshot.enabled,
        blacklist_repositories: snapshot.repositories.len(),
        blacklist_verdicts_cached: state.blacklist.verdict_count(),
    })
}

pub async fn get_cache_stats(State(state): State<ProxyState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

pub async fn clear_cache(State(state): State<ProxyState>) -> Json<ClearSummary> {
    Json(state.cache.clear())
}

/// Current policy document, as loaded from disk (not the compiled form).
pub async fn get_blacklist(State(state): State<ProxyState>) -> Json<BlacklistPolicy> {
    Json(state.blacklist.snapshot().source.clone())
}

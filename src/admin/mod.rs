//! Admin surface: bearer-token protected operational endpoints.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::http::ProxyState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Routes nested under `/admin`. Every route sits behind the bearer-token
/// check.
pub fn router(state: ProxyState) -> Router<ProxyState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/cache", get(get_cache_stats))
        .route("/cache/clear", post(clear_cache))
        .route("/blacklist", get(get_blacklist))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: admin surface plus the catch-all mirror handler
//! - Wire up middleware (tracing, request ID, concurrency limit)
//! - Buffer inbound bodies before dispatch
//! - Run with graceful shutdown, stopping the background tasks with it

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::error::ProxyError;
use crate::http::ProxyState;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::rewrite::RewriteContext;
use crate::routing;

/// Inbound bodies are fully buffered before dispatch; anything larger is
/// rejected up front.
const MAX_INBOUND_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the Axum router with all middleware layers.
pub fn build_router(state: ProxyState) -> Router {
    let max_connections = state.config.listener.max_connections;

    let mut router = Router::new()
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler));

    if state.config.admin.enabled {
        router = router.nest("/admin", admin::router(state.clone()));
    }

    router
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(GlobalConcurrencyLimitLayer::new(max_connections))
}

/// Catch-all mirror handler: buffer the body, derive the rewrite context
/// from the inbound request, and hand off to the dispatch pipeline.
async fn proxy_handler(State(state): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let ctx = rewrite_context(&parts.headers);

    let body = match axum::body::to_bytes(body, MAX_INBOUND_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return ProxyError::BodyTooLarge.into_response(),
    };

    routing::dispatch(&state, parts.method, &path, query.as_deref(), parts.headers, body, ctx).await
}

/// The origin the rewriter embeds into links and the CSP, derived from the
/// inbound Host header (and X-Forwarded-Proto when behind TLS termination).
fn rewrite_context(headers: &HeaderMap) -> RewriteContext {
    let proxy_host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|p| *p == "https")
        .unwrap_or("http")
        .to_string();
    RewriteContext { proxy_host, scheme }
}

/// Run the server until a shutdown signal arrives.
pub async fn run(state: ProxyState) -> Result<(), std::io::Error> {
    let shutdown = Shutdown::new();

    if state.config.observability.metrics_enabled {
        match state.config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                address = %state.config.observability.metrics_address,
                error = %e,
                "Invalid metrics address, exporter disabled"
            ),
        }
    }

    if state.config.cache.enabled {
        state.cache.spawn_sweeper(
            Duration::from_secs(state.config.cache.sweep_interval_secs),
            &shutdown,
        );
    }
    state.blacklist.spawn_poller(
        Duration::from_secs(state.config.blacklist.poll_interval_secs),
        &shutdown,
    );

    let listener = TcpListener::bind(&state.config.listener.bind_address).await?;
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Mirror proxy starting");

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Mirror proxy stopped");
    Ok(())
}

/// Wait for Ctrl+C, then stop the background tasks before the server
/// finishes draining connections.
async fn shutdown_signal(shutdown: Shutdown) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
    shutdown.trigger();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_rewrite_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("mirror.example.com:8080"));
        let ctx = rewrite_context(&headers);
        assert_eq!(ctx.proxy_host, "mirror.example.com:8080");
        assert_eq!(ctx.scheme, "http");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(rewrite_context(&headers).scheme, "https");
    }

    #[test]
    fn test_rewrite_context_defaults() {
        let ctx = rewrite_context(&HeaderMap::new());
        assert_eq!(ctx.proxy_host, "localhost");
        assert_eq!(ctx.scheme, "http");
    }
}

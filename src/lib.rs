//! Transforming mirror proxy for a code-hosting service.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 MIRROR PROXY                  │
//!                       │                                               │
//!   Client Request      │  ┌────────┐   ┌──────────┐   ┌────────────┐  │
//!   ────────────────────┼─▶│  http  │──▶│ routing  │──▶│ blacklist  │  │
//!                       │  │ server │   │ dispatch │   │   filter   │  │
//!                       │  └────────┘   └────┬─────┘   └────────────┘  │
//!                       │                    │                         │
//!                       │                    ▼                         │
//!                       │              ┌──────────┐    ┌────────────┐  │
//!                       │              │  cache   │    │  upstream  │──┼──▶ Upstream
//!                       │              │ (TTL)    │    │  client    │◀─┼─── Hosts
//!                       │              └──────────┘    └─────┬──────┘  │
//!                       │                                    │         │
//!   Client Response     │  ┌────────────────────┐            │         │
//!   ◀───────────────────┼──│ rewrite            │◀───────────┘         │
//!                       │  │ (html/css/headers) │                      │
//!                       │  └────────────────────┘                      │
//!                       │                                               │
//!                       │  ┌─────────────────────────────────────────┐ │
//!                       │  │          Cross-Cutting Concerns          │ │
//!                       │  │  config · observability · resilience ·   │ │
//!                       │  │  lifecycle · pages · admin               │ │
//!                       │  └─────────────────────────────────────────┘ │
//!                       └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod upstream;

// Content transformation
pub mod rewrite;

// Policy and caching
pub mod blacklist;
pub mod cache;

// Cross-cutting concerns
pub mod admin;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod pages;
pub mod resilience;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyState;
pub use lifecycle::Shutdown;

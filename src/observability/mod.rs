//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and components produce:
//!     → structured log events (tracing)
//!     → counters and histograms (metrics facade)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - The dispatcher emits one datapoint per completed request, success or
//!   failure; no internal metric storage lives in this crate
//! - Request ID flows through all log events via tower-http request-id

pub mod metrics;

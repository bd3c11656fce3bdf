//! Resilience primitives for upstream calls.
//!
//! # Design Decisions
//! - Retries run as an explicit loop with an attempt counter and an awaited
//!   delay, never as recursive continuations
//! - Jittered backoff prevents thundering herd against upstream
//! - Asset fallback stages (see `crate::routing::fallback`) do not consume
//!   the transport retry budget

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{is_idempotent, is_retryable};

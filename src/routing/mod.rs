//! Route dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! request path
//!     → profile.rs (prefix match → RouteKind + RouteProfile)
//!     → dispatcher.rs (blacklist → cache → upstream → rewrite → respond)
//!     → fallback.rs (alternate extensions / raw host, fragment+assets only)
//! ```

pub mod dispatcher;
pub mod fallback;
pub mod profile;

pub use dispatcher::dispatch;
pub use profile::{ResponseMode, RouteKind, RouteProfile, RouteTable};

//! Blacklist policy subsystem.
//!
//! # Data Flow
//! ```text
//! blacklist.json (poll mtime every 30s)
//!     → policy.rs (deserialize, compile lowercased snapshot)
//!     → filter.rs (arc-swap install, verdict cache invalidation)
//!     → dispatcher consults filter.check() before any upstream call
//! ```

pub mod filter;
pub mod policy;

pub use filter::{extract_repo, BlacklistFilter, BlockVerdict};
pub use policy::{BlacklistPolicy, PolicySnapshot};

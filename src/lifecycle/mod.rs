//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Initialize components → Spawn background
//!     tasks (cache sweeper, blacklist poller) → Start listener
//!
//! Shutdown:
//!     SIGINT/SIGTERM → stop accepting → broadcast to background tasks → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;

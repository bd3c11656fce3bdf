//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; route profiles never change at runtime
//! - All fields have defaults to allow minimal (or empty) configs
//! - The blacklist policy lives in its own JSON file with separate
//!   hot-reload machinery (see `crate::blacklist`)

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BlacklistFileConfig, CacheConfig, CallProfileConfig, ListenerConfig,
    ObservabilityConfig, PagesConfig, ProfilesConfig, ProxyConfig, UpstreamConfig,
};

//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! upstream response
//!     → html.rs (body: links, styles, fragments, bootstrap scripts, CSP meta)
//!     → headers.rs (CSP synthesis, security headers, Location)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Pure, no I/O: deterministic for a given input and context, which keeps
//!   the whole layer snapshot-testable
//! - One host table (hosts.rs) drives every rewrite site so the mappings
//!   cannot drift apart

pub mod headers;
pub mod hosts;
pub mod html;

pub use headers::rewrite_headers;
pub use hosts::UpstreamHosts;
pub use html::rewrite_html;

/// Per-request parameters for link/CSP rewriting, derived from the inbound
/// Host header. Not persisted.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub proxy_host: String,
    pub scheme: String,
}

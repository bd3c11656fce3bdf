//! Locally served HTML documents.
//!
//! The home page and the error pages (404, 403, 451) are served from disk
//! when the configured file exists, falling back to compact embedded
//! defaults otherwise. Loaded once at startup; edits require a restart.

use std::fs;
use std::sync::Arc;

use crate::config::PagesConfig;

const DEFAULT_HOME: &str = include_str!("default_home.html");
const DEFAULT_NOT_FOUND: &str = include_str!("default_404.html");
const DEFAULT_FORBIDDEN: &str = include_str!("default_403.html");
const DEFAULT_BLOCKED: &str = include_str!("default_451.html");

/// The four locally held documents.
#[derive(Debug, Clone)]
pub struct Pages {
    pub home: Arc<String>,
    pub not_found: Arc<String>,
    pub forbidden: Arc<String>,
    pub blocked: Arc<String>,
}

fn load_or(path: &str, fallback: &str) -> Arc<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            tracing::info!(path, "Loaded custom page");
            Arc::new(content)
        }
        Err(_) => Arc::new(fallback.to_string()),
    }
}

impl Pages {
    pub fn load(config: &PagesConfig) -> Self {
        Self {
            home: load_or(&config.home, DEFAULT_HOME),
            not_found: load_or(&config.not_found, DEFAULT_NOT_FOUND),
            forbidden: load_or(&config.forbidden, DEFAULT_FORBIDDEN),
            blocked: load_or(&config.blocked, DEFAULT_BLOCKED),
        }
    }
}

impl Default for Pages {
    fn default() -> Self {
        Self::load(&PagesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_use_embedded_defaults() {
        let pages = Pages::load(&PagesConfig {
            home: "/nonexistent/home.html".to_string(),
            not_found: "/nonexistent/404.html".to_string(),
            forbidden: "/nonexistent/403.html".to_string(),
            blocked: "/nonexistent/451.html".to_string(),
        });
        assert!(pages.home.contains("<html"));
        assert!(pages.not_found.contains("404"));
        assert!(pages.blocked.contains("451"));
    }

    #[test]
    fn test_custom_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home.html");
        fs::write(&path, "<html><body>custom</body></html>").unwrap();

        let pages = Pages::load(&PagesConfig {
            home: path.to_string_lossy().into_owned(),
            ..PagesConfig::default()
        });
        assert!(pages.home.contains("custom"));
    }
}

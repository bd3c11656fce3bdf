//! Hot-reloaded blacklist filter.
//!
//! # Responsibilities
//! - Evaluate requests against the policy before any upstream call
//! - Extract "owner/repo" with route-specific patterns
//! - Memoize verdicts per path; invalidate wholesale on reload
//! - Poll the policy file mtime and swap snapshots atomically
//!
//! # Design Decisions
//! - Reload only when the file's modification time advances; an unchanged
//!   mtime leaves both the snapshot and the verdict cache untouched
//! - A corrupt file never fails open: the last good snapshot stays active,
//!   or the hardcoded disabled default when nothing ever loaded
//! - Readers go through arc-swap and never observe a partial policy

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::blacklist::policy::{BlacklistPolicy, PolicySnapshot};
use crate::lifecycle::Shutdown;
use crate::routing::profile::RouteKind;

/// Outcome for a blocked request.
#[derive(Debug, Clone)]
pub struct BlockVerdict {
    pub status: u16,
    pub message: String,
}

/// Paths that are never repository-shaped.
const SKIP_PREFIXES: [&str; 5] = ["/admin", "/assets", "/static", "/favicon", "/fragment"];

/// Second path segment values that mark an API action-suffix pattern
/// (`/{owner}/{repo}/issues`, ...).
const ACTION_SUFFIXES: [&str; 10] = [
    "issues", "pulls", "commits", "branches", "tags", "releases", "contents", "actions",
    "contributors", "languages",
];

/// First segments on the site route that are not owners.
const SITE_MARKERS: [&str; 8] = [
    "admin", "static", "assets", "login", "logout", "search", "settings", "notifications",
];

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Extract "owner/repo" (lowercased) from a request path, using the
/// matched route's shape. Returns `None` for non-repository paths.
pub fn extract_repo(path: &str, kind: RouteKind) -> Option<String> {
    if SKIP_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return None;
    }

    let owner_repo = |segs: &[&str]| -> Option<String> {
        if segs.len() >= 2 {
            Some(format!("{}/{}", segs[0], segs[1]).to_lowercase())
        } else {
            None
        }
    };

    match kind {
        RouteKind::Api => {
            let rest = path.strip_prefix("/api").unwrap_or(path);
            let segs = segments(rest);
            match segs.as_slice() {
                ["repos", owner, repo, ..] => Some(format!("{owner}/{repo}").to_lowercase()),
                [owner, repo, action, ..] if ACTION_SUFFIXES.contains(action) => {
                    Some(format!("{owner}/{repo}").to_lowercase())
                }
                _ => None,
            }
        }
        RouteKind::Raw => owner_repo(&segments(path.strip_prefix("/raw").unwrap_or(path))),
        RouteKind::Releases => owner_repo(&segments(path.strip_prefix("/releases").unwrap_or(path))),
        RouteKind::Codeload => owner_repo(&segments(path.strip_prefix("/codeload").unwrap_or(path))),
        RouteKind::Site => {
            let segs = segments(path);
            if segs.first().is_some_and(|s| SITE_MARKERS.contains(s)) {
                return None;
            }
            owner_repo(&segs)
        }
        RouteKind::Assets | RouteKind::Fragment | RouteKind::Admin => None,
    }
}

/// Shared blacklist filter with memoized verdicts.
pub struct BlacklistFilter {
    path: PathBuf,
    snapshot: ArcSwap<PolicySnapshot>,
    verdicts: DashMap<String, bool>,
    last_mtime: Mutex<Option<SystemTime>>,
}

impl BlacklistFilter {
    /// Load the policy file, creating it with defaults when missing.
    /// Never fails: an unreadable file yields the disabled default.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if !path.exists() {
            if let Err(e) = Self::write_default(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Could not create default blacklist file");
            }
        }

        let filter = Self {
            path,
            snapshot: ArcSwap::from_pointee(PolicySnapshot::disabled()),
            verdicts: DashMap::new(),
            last_mtime: Mutex::new(None),
        };

        if let Err(e) = filter.reload_if_modified() {
            tracing::warn!(error = %e, "Initial blacklist load failed, running disabled");
        }
        filter
    }

    fn write_default(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(&BlacklistPolicy::default())
            .expect("default policy serializes");
        std::fs::write(path, body)?;
        tracing::info!(path = %path.display(), "Created default blacklist file");
        Ok(())
    }

    /// Reload when the file's mtime has advanced past the last seen value.
    /// Returns true when a new snapshot was installed.
    pub fn reload_if_modified(&self) -> std::io::Result<bool> {
        let mtime = std::fs::metadata(&self.path)?.modified()?;

        {
            let last = self.last_mtime.lock().expect("mtime mutex poisoned");
            if last.is_some_and(|seen| mtime <= seen) {
                return Ok(false);
            }
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<BlacklistPolicy>(&content) {
            Ok(policy) => {
                self.snapshot.store(Arc::new(PolicySnapshot::compile(policy)));
                self.verdicts.clear();
                *self.last_mtime.lock().expect("mtime mutex poisoned") = Some(mtime);
                tracing::info!(path = %self.path.display(), "Blacklist policy reloaded");
                Ok(true)
            }
            Err(e) => {
                // Keep the last good snapshot; the next poll retries.
                tracing::error!(path = %self.path.display(), error = %e, "Blacklist reload failed, keeping previous policy");
                Ok(false)
            }
        }
    }

    /// Current policy snapshot (admin surface).
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot.load_full()
    }

    /// Number of memoized verdicts (admin/testing).
    pub fn verdict_count(&self) -> usize {
        self.verdicts.len()
    }

    /// Evaluate a request path. `Some` means blocked.
    pub fn check(&self, path: &str, kind: RouteKind) -> Option<BlockVerdict> {
        let snapshot = self.snapshot.load();
        if !snapshot.enabled {
            return None;
        }

        let blocked = match self.verdicts.get(path) {
            Some(verdict) => *verdict,
            None => {
                let verdict = Self::evaluate(&snapshot, path, kind);
                self.verdicts.insert(path.to_string(), verdict);
                verdict
            }
        };

        if blocked {
            if snapshot.log_blocked {
                tracing::warn!(path, "Request blocked by policy");
            }
            Some(BlockVerdict {
                status: snapshot.status_code,
                message: snapshot.message.clone(),
            })
        } else {
            None
        }
    }

    fn evaluate(snapshot: &PolicySnapshot, path: &str, kind: RouteKind) -> bool {
        let repo = extract_repo(path, kind);

        if let Some(repo) = &repo {
            if snapshot.whitelist.contains(repo) {
                return false;
            }
            if snapshot.repositories.contains(repo) {
                return true;
            }
        }

        let lowered = path.to_lowercase();
        snapshot.keywords.iter().any(|k| lowered.contains(k))
    }

    /// Spawn the 30s-interval mtime poll task.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration, shutdown: &Shutdown) {
        let filter = Arc::clone(self);
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = filter.reload_if_modified() {
                            tracing::debug!(error = %e, "Blacklist poll failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Blacklist poller stopping");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_policy(path: &Path, policy: &BlacklistPolicy) {
        fs::write(path, serde_json::to_string(policy).unwrap()).unwrap();
    }

    fn enabled_policy() -> BlacklistPolicy {
        BlacklistPolicy {
            enabled: true,
            repositories: vec!["Bad/Repo".to_string()],
            keywords: vec!["forbidden-word".to_string()],
            whitelist_repositories: vec!["bad/allowed".to_string()],
            ..BlacklistPolicy::default()
        }
    }

    #[test]
    fn test_extract_repo_per_route() {
        assert_eq!(extract_repo("/Owner/Repo", RouteKind::Site), Some("owner/repo".to_string()));
        assert_eq!(
            extract_repo("/raw/o/r/main/file.txt", RouteKind::Raw),
            Some("o/r".to_string())
        );
        assert_eq!(
            extract_repo("/api/repos/o/r/contents", RouteKind::Api),
            Some("o/r".to_string())
        );
        assert_eq!(extract_repo("/api/o/r/issues", RouteKind::Api), Some("o/r".to_string()));
        assert_eq!(extract_repo("/api/user", RouteKind::Api), None);
        assert_eq!(extract_repo("/login", RouteKind::Site), None);
        assert_eq!(extract_repo("/admin/users", RouteKind::Site), None);
    }

    #[test]
    fn test_blocked_repo_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        write_policy(&path, &enabled_policy());

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(filter.check("/BAD/REPO", RouteKind::Site).is_some());
        assert!(filter.check("/bad/repo/issues", RouteKind::Site).is_some());
        assert!(filter.check("/good/repo", RouteKind::Site).is_none());
    }

    #[test]
    fn test_whitelist_overrides_keywords_and_repos() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        let mut policy = enabled_policy();
        policy.repositories.push("bad/allowed".to_string());
        write_policy(&path, &policy);

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(filter.check("/bad/allowed", RouteKind::Site).is_none());
    }

    #[test]
    fn test_keyword_matches_full_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        write_policy(&path, &enabled_policy());

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(filter
            .check("/some/repo/blob/main/Forbidden-Word.md", RouteKind::Site)
            .is_some());
    }

    #[test]
    fn test_unchanged_mtime_keeps_verdict_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        write_policy(&path, &enabled_policy());

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(filter.check("/bad/repo", RouteKind::Site).is_some());
        assert_eq!(filter.verdict_count(), 1);

        // Same mtime: no reload, memoized verdicts survive
        assert!(!filter.reload_if_modified().unwrap());
        assert_eq!(filter.verdict_count(), 1);
    }

    #[test]
    fn test_reload_on_mtime_advance_clears_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        write_policy(&path, &enabled_policy());

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(filter.check("/bad/repo", RouteKind::Site).is_some());

        let mut updated = enabled_policy();
        updated.repositories.clear();
        write_policy(&path, &updated);
        let future = SystemTime::now() + Duration::from_secs(2);
        let file = fs::File::options().append(true).open(&path).unwrap();
        file.set_modified(future).unwrap();
        drop(file);

        assert!(filter.reload_if_modified().unwrap());
        assert_eq!(filter.verdict_count(), 0);
        assert!(filter.check("/bad/repo", RouteKind::Site).is_none());
    }

    #[test]
    fn test_corrupt_reload_keeps_last_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        write_policy(&path, &enabled_policy());

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(filter.check("/bad/repo", RouteKind::Site).is_some());

        fs::write(&path, "{ not json").unwrap();
        let future = SystemTime::now() + Duration::from_secs(2);
        let file = fs::File::options().append(true).open(&path).unwrap();
        file.set_modified(future).unwrap();
        drop(file);

        assert!(!filter.reload_if_modified().unwrap());
        assert!(filter.check("/bad/repo", RouteKind::Site).is_some());
    }

    #[test]
    fn test_missing_file_auto_created_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new-policy.json");

        let filter = BlacklistFilter::load_or_default(&path);
        assert!(path.exists());
        assert!(filter.check("/anything/at-all", RouteKind::Site).is_none());
    }
}

//! Upstream host → proxy prefix mapping.
//!
//! The same table drives HTML link rewriting, CSS `url(...)` rewriting and
//! `Location` header rewriting, so every outbound reference resolves back
//! through the proxy.

use url::Url;

use crate::config::UpstreamConfig;

/// One upstream surface: its absolute base URL and the proxy path prefix
/// that replaces it.
#[derive(Debug, Clone)]
struct HostMapping {
    base: String,
    prefix: &'static str,
}

/// Immutable mapping table built once from config.
#[derive(Debug, Clone)]
pub struct UpstreamHosts {
    /// Subdomain-bearing hosts first; the bare site host last so it never
    /// shadows the longer matches.
    mappings: Vec<HostMapping>,

    /// Hostnames (no scheme) allowed by the synthesized CSP.
    pub csp_allowed: Vec<String>,
}

fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

fn host_of(base: &str) -> Option<String> {
    Url::parse(base).ok().and_then(|u| u.host_str().map(str::to_string))
}

impl UpstreamHosts {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        let mappings = vec![
            HostMapping { base: trim_base(&config.api), prefix: "/api" },
            HostMapping { base: trim_base(&config.raw), prefix: "/raw" },
            HostMapping { base: trim_base(&config.assets), prefix: "/assets" },
            HostMapping { base: trim_base(&config.releases), prefix: "/releases" },
            HostMapping { base: trim_base(&config.codeload), prefix: "/codeload" },
            HostMapping { base: trim_base(&config.site), prefix: "" },
        ];

        let mut csp_allowed = config.csp_allowed_hosts.clone();
        for mapping in &mappings {
            if let Some(host) = host_of(&mapping.base) {
                if !csp_allowed.contains(&host) {
                    csp_allowed.push(host);
                }
            }
        }

        Self { mappings, csp_allowed }
    }

    /// Rewrite an absolute upstream URL into its proxy-relative equivalent.
    /// Returns `None` when the URL does not point at a known upstream host.
    pub fn rewrite_url(&self, url: &str) -> Option<String> {
        for mapping in &self.mappings {
            if let Some(rest) = url.strip_prefix(&mapping.base) {
                if rest.is_empty() {
                    return Some(if mapping.prefix.is_empty() {
                        "/".to_string()
                    } else {
                        mapping.prefix.to_string()
                    });
                }
                if rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('#') {
                    return Some(format!("{}{rest}", mapping.prefix));
                }
            }
        }
        None
    }

    /// Rewrite every upstream base URL occurrence inside CSS text
    /// (inline `url(...)` references in style attributes and blocks).
    pub fn rewrite_css(&self, css: &str) -> String {
        let mut out = css.to_string();
        for mapping in &self.mappings {
            let from = format!("{}/", mapping.base);
            let to = format!("{}/", mapping.prefix);
            out = out.replace(&from, &to);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> UpstreamHosts {
        UpstreamHosts::from_config(&UpstreamConfig::default())
    }

    #[test]
    fn test_site_urls_become_root_relative() {
        let h = hosts();
        assert_eq!(h.rewrite_url("https://github.com/o/r"), Some("/o/r".to_string()));
        assert_eq!(h.rewrite_url("https://github.com"), Some("/".to_string()));
    }

    #[test]
    fn test_subdomain_hosts_get_their_prefix() {
        let h = hosts();
        assert_eq!(
            h.rewrite_url("https://raw.githubusercontent.com/o/r/main/f.txt"),
            Some("/raw/o/r/main/f.txt".to_string())
        );
        assert_eq!(
            h.rewrite_url("https://api.github.com/repos/o/r"),
            Some("/api/repos/o/r".to_string())
        );
        assert_eq!(
            h.rewrite_url("https://codeload.github.com/o/r/zip/main"),
            Some("/codeload/o/r/zip/main".to_string())
        );
    }

    #[test]
    fn test_unknown_hosts_untouched() {
        let h = hosts();
        assert_eq!(h.rewrite_url("https://example.com/x"), None);
        // Similar hostname but not an exact base match
        assert_eq!(h.rewrite_url("https://github.community/x"), None);
    }

    #[test]
    fn test_css_rewrite() {
        let h = hosts();
        let css = "background:url(https://github.githubassets.com/img/bg.png)";
        assert_eq!(h.rewrite_css(css), "background:url(/assets/img/bg.png)");
    }
}

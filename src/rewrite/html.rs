//! HTML body rewriting.
//!
//! Two lol_html passes over the document:
//! 1. rewrite upstream references in `src`/`href`/`data-url`/`data-src`/
//!    `content` attributes and inline `url(...)` styles, wrap lazy-load
//!    `include-fragment` targets as `/fragment/{url}`, and lift out the
//!    render-blocking bootstrap scripts;
//! 2. prepend the fallback CSP meta tag and the collected bootstrap
//!    scripts to `<head>` so they load ahead of other head content.
//!
//! Pure and deterministic for a given input and host table.

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::html_content::ContentType;
use lol_html::{element, text, rewrite_str, RewriteStrSettings};

use crate::rewrite::hosts::UpstreamHosts;

/// Fallback policy injected as a meta tag; the real policy is set on the
/// response headers, this is a safety net for saved/offline copies.
const FALLBACK_CSP_META: &str = "<meta http-equiv=\"Content-Security-Policy\" \
     content=\"default-src * 'self' 'unsafe-inline' 'unsafe-eval' data: blob:\">";

/// Attribute names rewritten on every element carrying them.
const URL_ATTRIBUTES: [&str; 5] = ["src", "href", "data-url", "data-src", "content"];

/// A head script whose `src` matches the asset prefix and one of these
/// markers is considered part of the framework bootstrap and is moved to
/// the front of `<head>`.
const BOOTSTRAP_MARKERS: [&str; 4] = ["environment", "wp-runtime", "vendors-node_modules", "react-lib"];

fn is_absolute(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn is_bootstrap_src(src: &str) -> bool {
    src.starts_with("/assets/") && BOOTSTRAP_MARKERS.iter().any(|m| src.contains(m))
}

/// Rewrite an HTML document so every upstream reference resolves through
/// the proxy. On a structural rewriting error the caller should fall back
/// to the original body.
pub fn rewrite_html(body: &str, hosts: &UpstreamHosts) -> Result<String, lol_html::errors::RewritingError> {
    let bootstrap_scripts: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let mut handlers = vec![
        // Lazy-load fragments fetch absolute upstream URLs client-side;
        // wrap them so the later fetch is itself proxied.
        element!("include-fragment[src]", {
            move |el| {
                if let Some(src) = el.get_attribute("src") {
                    if is_absolute(&src) {
                        el.set_attribute("src", &format!("/fragment/{src}"))?;
                    }
                }
                Ok(())
            }
        }),
        element!("*[style]", {
            let hosts = hosts.clone();
            move |el| {
                if let Some(style) = el.get_attribute("style") {
                    let rewritten = hosts.rewrite_css(&style);
                    if rewritten != style {
                        el.set_attribute("style", &rewritten)?;
                    }
                }
                Ok(())
            }
        }),
        element!("script[src]", {
            let hosts = hosts.clone();
            let bootstrap = Rc::clone(&bootstrap_scripts);
            move |el| {
                if let Some(src) = el.get_attribute("src") {
                    let effective = hosts.rewrite_url(&src).unwrap_or(src);
                    if is_bootstrap_src(&effective) {
                        bootstrap.borrow_mut().push(effective);
                        el.remove();
                    }
                }
                Ok(())
            }
        }),
        text!("style", {
            let hosts = hosts.clone();
            move |chunk| {
                let rewritten = hosts.rewrite_css(chunk.as_str());
                if rewritten != chunk.as_str() {
                    chunk.replace(&rewritten, ContentType::Text);
                }
                Ok(())
            }
        }),
    ];

    for attr in URL_ATTRIBUTES {
        handlers.push(element!(format!("*[{attr}]"), {
            let hosts = hosts.clone();
            move |el| {
                if let Some(value) = el.get_attribute(attr) {
                    if let Some(rewritten) = hosts.rewrite_url(&value) {
                        el.set_attribute(attr, &rewritten)?;
                    }
                }
                Ok(())
            }
        }));
    }

    let first_pass = rewrite_str(
        body,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )?;

    let collected = bootstrap_scripts.borrow();
    let mut head_injection = String::from(FALLBACK_CSP_META);
    for src in collected.iter() {
        head_injection.push_str(&format!("<script src=\"{src}\" defer></script>"));
    }
    drop(collected);

    rewrite_str(
        &first_pass,
        RewriteStrSettings {
            element_content_handlers: vec![element!("head", {
                let injection = head_injection.clone();
                move |el| {
                    el.prepend(&injection, ContentType::Html);
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    fn hosts() -> UpstreamHosts {
        UpstreamHosts::from_config(&UpstreamConfig::default())
    }

    #[test]
    fn test_href_to_main_host_becomes_relative() {
        let out = rewrite_html(r#"<a href="https://github.com/o/r">repo</a>"#, &hosts()).unwrap();
        assert!(out.contains(r#"href="/o/r""#), "got: {out}");
    }

    #[test]
    fn test_href_to_raw_host_gets_raw_prefix() {
        let out =
            rewrite_html(r#"<a href="https://raw.githubusercontent.com/o/r/main/x">x</a>"#, &hosts())
                .unwrap();
        assert!(out.contains(r#"href="/raw/o/r/main/x""#), "got: {out}");
    }

    #[test]
    fn test_img_and_data_attrs_rewritten() {
        let html = concat!(
            r#"<img src="https://github.githubassets.com/images/logo.png">"#,
            r#"<div data-url="https://api.github.com/repos/o/r"></div>"#,
            r#"<div data-src="https://raw.githubusercontent.com/o/r/f"></div>"#,
        );
        let out = rewrite_html(html, &hosts()).unwrap();
        assert!(out.contains(r#"src="/assets/images/logo.png""#));
        assert!(out.contains(r#"data-url="/api/repos/o/r""#));
        assert!(out.contains(r#"data-src="/raw/o/r/f""#));
    }

    #[test]
    fn test_meta_content_rewritten() {
        let out = rewrite_html(
            r#"<meta property="og:image" content="https://github.com/o/r/social.png">"#,
            &hosts(),
        )
        .unwrap();
        assert!(out.contains(r#"content="/o/r/social.png""#));
    }

    #[test]
    fn test_include_fragment_wrapped() {
        let out = rewrite_html(
            r#"<include-fragment src="https://github.com/o/r/releases/expanded_assets/v1"></include-fragment>"#,
            &hosts(),
        )
        .unwrap();
        assert!(
            out.contains(r#"src="/fragment/https://github.com/o/r/releases/expanded_assets/v1""#),
            "got: {out}"
        );
    }

    #[test]
    fn test_relative_links_untouched() {
        let input = r#"<a href="/local/path">x</a><img src="logo.png">"#;
        let out = rewrite_html(input, &hosts()).unwrap();
        assert!(out.contains(r#"href="/local/path""#));
        assert!(out.contains(r#"src="logo.png""#));
    }

    #[test]
    fn test_inline_style_url_rewritten() {
        let out = rewrite_html(
            r#"<div style="background:url(https://github.githubassets.com/bg.png)"></div>"#,
            &hosts(),
        )
        .unwrap();
        assert!(out.contains("url(/assets/bg.png)"), "got: {out}");
    }

    #[test]
    fn test_style_block_rewritten() {
        let out = rewrite_html(
            "<style>.x{background:url(https://github.githubassets.com/a.png)}</style>",
            &hosts(),
        )
        .unwrap();
        assert!(out.contains("url(/assets/a.png)"));
    }

    #[test]
    fn test_csp_meta_injected_into_head() {
        let out = rewrite_html("<html><head><title>t</title></head><body></body></html>", &hosts())
            .unwrap();
        let head_start = out.find("<head>").unwrap();
        let meta_pos = out.find("Content-Security-Policy").unwrap();
        let title_pos = out.find("<title>").unwrap();
        assert!(head_start < meta_pos && meta_pos < title_pos);
    }

    #[test]
    fn test_bootstrap_scripts_moved_to_head_front() {
        let html = concat!(
            "<html><head>",
            r#"<link rel="stylesheet" href="https://github.githubassets.com/main.css">"#,
            r#"<script src="https://github.githubassets.com/assets/wp-runtime-123.js"></script>"#,
            "</head><body></body></html>",
        );
        let out = rewrite_html(html, &hosts()).unwrap();
        let script_pos = out.find("wp-runtime-123.js").unwrap();
        let link_pos = out.find("main.css").unwrap();
        assert!(script_pos < link_pos, "bootstrap script should precede other head content: {out}");
        assert!(out.contains(r#"src="/assets/assets/wp-runtime-123.js""#));
    }

    #[test]
    fn test_deterministic() {
        let html = r#"<a href="https://github.com/a/b">x</a>"#;
        let h = hosts();
        assert_eq!(rewrite_html(html, &h).unwrap(), rewrite_html(html, &h).unwrap());
    }
}

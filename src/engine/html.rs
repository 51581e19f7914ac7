//! Lightweight HTML inspection for the web engine. Pattern based, no DOM.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use crate::result::StructureAnalysis;

static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());
static META_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bname\s*=\s*["']?([a-z-]+)"#).unwrap()
});
static HTML_LANG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<html\b[^>]*\blang\s*=\s*["']?[a-z]"#).unwrap()
});
static H1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h1[\s>]").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h[1-6][\s>]").unwrap());
static IMG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());
static ALT_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\salt\s*=").unwrap());
static FORM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<form[\s>]").unwrap());
static SCRIPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<script[\s>]").unwrap());
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\shref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn analyze_structure(html: &str) -> StructureAnalysis {
    let title = TITLE
        .captures(html)
        .map(|c| WHITESPACE.replace_all(c[1].trim(), " ").into_owned())
        .filter(|t| !t.is_empty());

    let meta_names: Vec<String> = META_TAG
        .find_iter(html)
        .filter_map(|m| META_NAME.captures(m.as_str()))
        .map(|c| c[1].to_ascii_lowercase())
        .collect();

    let images: Vec<&str> = IMG.find_iter(html).map(|m| m.as_str()).collect();
    let images_missing_alt = images.iter().filter(|tag| !ALT_ATTR.is_match(tag)).count();

    StructureAnalysis {
        title,
        has_meta_description: meta_names.iter().any(|n| n == "description"),
        has_viewport: meta_names.iter().any(|n| n == "viewport"),
        has_lang: HTML_LANG.is_match(html),
        h1_count: H1.find_iter(html).count() as u32,
        heading_count: HEADING.find_iter(html).count() as u32,
        image_count: images.len() as u32,
        images_missing_alt: images_missing_alt as u32,
        form_count: FORM.find_iter(html).count() as u32,
        script_count: SCRIPT.find_iter(html).count() as u32,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub internal: Vec<Url>,
    pub external: Vec<Url>,
}

impl PageLinks {
    pub fn total(&self) -> usize {
        self.internal.len() + self.external.len()
    }

    /// Internal links first, then external, at most `limit`.
    pub fn to_check(&self, limit: usize) -> Vec<Url> {
        self.internal
            .iter()
            .chain(self.external.iter())
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Distinct http(s) links of the page, resolved against `base`. Fragments are
/// dropped, so `/a#x` and `/a#y` count once.
pub fn extract_links(html: &str, base: &Url) -> PageLinks {
    let mut seen = HashSet::new();
    let mut links = PageLinks::default();

    for caps in ANCHOR_HREF.captures_iter(html) {
        let raw = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let Ok(mut resolved) = base.join(raw) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);
        if !seen.insert(resolved.to_string()) {
            continue;
        }

        if resolved.host_str() == base.host_str() {
            links.internal.push(resolved);
        } else {
            links.external.push(resolved);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <title>
    Acme   Widgets
  </title>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width">
  <script src="/app.js"></script>
</head>
<body>
  <h1>Widgets</h1>
  <h2>Catalog</h2>
  <img src="a.png" alt="A widget">
  <img src="b.png">
  <img src="spacer.gif" alt="">
  <form action="/search"></form>
  <a href="/about">About</a>
  <a href="/about#team">Team</a>
  <a href='https://other.example.org/page'>Partner</a>
  <a href="mailto:hi@acme.test">Mail</a>
  <a href="#top">Top</a>
  <a class="x" href=contact.html>Contact</a>
</body>
</html>"##;

    #[test]
    fn test_analyze_structure() {
        let s = analyze_structure(PAGE);
        assert_eq!(s.title.as_deref(), Some("Acme Widgets"));
        assert!(!s.has_meta_description);
        assert!(s.has_viewport);
        assert!(s.has_lang);
        assert_eq!(s.h1_count, 1);
        assert_eq!(s.heading_count, 2);
        assert_eq!(s.image_count, 3);
        assert_eq!(s.images_missing_alt, 1);
        assert_eq!(s.form_count, 1);
        assert_eq!(s.script_count, 1);
    }

    #[test]
    fn test_empty_page() {
        let s = analyze_structure("");
        assert!(s.title.is_none());
        assert!(!s.has_lang);
        assert_eq!(s.h1_count, 0);
    }

    #[test]
    fn test_extract_links_resolves_and_dedupes() {
        let base = Url::parse("https://acme.test/shop/").unwrap();
        let links = extract_links(PAGE, &base);

        let internal: Vec<String> = links.internal.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            internal,
            vec![
                "https://acme.test/about".to_string(),
                "https://acme.test/shop/contact.html".to_string(),
            ]
        );
        assert_eq!(links.external.len(), 1);
        assert_eq!(links.external[0].host_str(), Some("other.example.org"));
        assert_eq!(links.total(), 3);
    }

    #[test]
    fn test_to_check_prefers_internal() {
        let base = Url::parse("https://acme.test/").unwrap();
        let links = extract_links(PAGE, &base);
        let picked = links.to_check(2);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|u| u.host_str() == Some("acme.test")));
    }
}

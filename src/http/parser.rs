//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Links found on the page: absolute, fragment-free, deduplicated, in
    /// document order
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Anything that does not resolve to http(s)
///
/// # Arguments
///
/// * `html` - Page body; malformed markup is tolerated
/// * `base_url` - Final URL of the page, used to resolve relative links
///
/// # Returns
///
/// The title, if any, and the followable links. Parsing never fails.
///
/// # Example
///
/// ```
/// use fastgets::http::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL without its fragment
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);

    Some(absolute_url.to_string())
}

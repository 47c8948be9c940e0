use crate::error::{Result, ScanError};
use crate::normalize::normalize;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Links and title pulled out of one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Normalized, deduplicated, in document order.
    pub links: Vec<String>,
    pub title: Option<String>,
}

/// Parse `html` and collect every outbound link resolved against `base_url`.
///
/// Sources are `<a href>`, `<area href>` and `<meta http-equiv="refresh">`
/// targets. Fragment-only hrefs point back at the page itself and are skipped.
pub fn extract_links(html: &str, base_url: &Url) -> Result<ExtractedPage> {
    let document = Html::parse_document(html);

    let link_selector = parse_selector("a[href], area[href]")?;
    let refresh_selector = parse_selector("meta[http-equiv][content]")?;
    let title_selector = parse_selector("title")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut push = |href: &str| {
        if href.trim_start().starts_with('#') {
            return;
        }
        if let Some(absolute_url) = normalize(href, Some(base_url))
            && seen.insert(absolute_url.clone())
        {
            debug!("Found link: {}", absolute_url);
            links.push(absolute_url);
        }
    };

    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href") {
            push(href);
        }
    }

    for element in document.select(&refresh_selector) {
        let is_refresh = element
            .value()
            .attr("http-equiv")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"));
        if is_refresh
            && let Some(target) = element.value().attr("content").and_then(refresh_target)
        {
            push(target);
        }
    }

    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());

    Ok(ExtractedPage { links, title })
}

fn parse_selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("selector {}: {}", css, e)))
}

/// `content="5; url=/next"` -> `/next`
fn refresh_target(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let idx = lower.find("url=")?;
    let target = content[idx + 4..].split(';').next()?.trim();
    let target = target.trim_matches(|c| c == '\'' || c == '"').trim();
    if target.is_empty() { None } else { Some(target) }
}

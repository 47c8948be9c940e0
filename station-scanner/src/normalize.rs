//! URL canonicalization and same-domain classification.
//!
//! Every URL that enters the crawl graph or the sitemap route list goes
//! through [`normalize`], so two spellings of the same page always compare
//! equal: scheme and host lower-cased, default port dropped, fragment
//! stripped, and a trailing slash removed from any path other than `/`.
//! Query strings are kept as-is.

use url::Url;

/// Resolve `raw` against `base` and canonicalize it.
///
/// Returns `None` for anything that is not an absolute http(s) URL after
/// resolution (`mailto:`, `javascript:`, `tel:`, garbage input).
pub fn normalize(raw: &str, base: Option<&Url>) -> Option<String> {
    normalize_url(raw, base).map(String::from)
}

/// Same as [`normalize`], returning the parsed [`Url`].
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut url = match base {
        Some(base) => base.join(trimmed).ok()?,
        None if trimmed.starts_with("//") => Url::parse(&format!("https:{}", trimmed)).ok()?,
        None => Url::parse(trimmed).ok()?,
    };

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/');
        let stripped = if stripped.is_empty() { "/" } else { stripped }.to_string();
        url.set_path(&stripped);
    }

    Some(url)
}

/// Lower-cased host of an absolute URL string.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Exact hostname comparison; `blog.example.com` is not `example.com`.
pub fn is_same_domain(url: &str, start_url: &str) -> bool {
    match (host_of(url), host_of(start_url)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

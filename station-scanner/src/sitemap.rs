//! Sitemap discovery: robots.txt `Sitemap:` directives first, `/sitemap.xml`
//! as the fallback. Sitemap indexes are followed a few levels deep.
//!
//! Everything here is best-effort. A missing robots.txt, an unreachable
//! sitemap or malformed XML only shrinks the route list.

use crate::error::{Result, ScanError};
use crate::fetcher::Fetcher;
use crate::graph::CrawlGraph;
use crate::normalize::{extract_url_path, is_same_domain, normalize, normalize_url};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

/// How many `<sitemapindex>` levels are followed below a top-level sitemap.
pub const MAX_SITEMAP_NESTING: usize = 3;
/// Upper bound on sitemap documents fetched per collection.
pub const MAX_SITEMAP_FILES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapRoute {
    pub path: String,
    /// Normalized absolute URL; compared against crawl graph keys.
    pub url: String,
}

impl SitemapRoute {
    pub fn new(url: String) -> Self {
        Self {
            path: extract_url_path(&url),
            url,
        }
    }
}

/// `<loc>` values pulled out of one sitemap document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSitemap {
    /// `<urlset><url><loc>` entries.
    pub routes: Vec<String>,
    /// `<sitemapindex><sitemap><loc>` entries.
    pub child_sitemaps: Vec<String>,
}

/// Namespace of `<urlset>` / `<sitemapindex>` documents.
const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Root,
    Url,
    Sitemap,
    Loc,
    Other,
}

/// Sitemap elements are either unqualified or in the sitemap namespace;
/// extensions such as `<image:loc>` live elsewhere and are ignored.
fn classify(ns: &ResolveResult, local_name: &[u8]) -> Tag {
    let in_sitemap_ns = match ns {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => *uri == SITEMAP_NS,
        ResolveResult::Unknown(_) => false,
    };
    if !in_sitemap_ns {
        return Tag::Other;
    }
    match local_name {
        b"urlset" | b"sitemapindex" => Tag::Root,
        b"url" => Tag::Url,
        b"sitemap" => Tag::Sitemap,
        b"loc" => Tag::Loc,
        _ => Tag::Other,
    }
}

/// Only a `<loc>` directly inside `<url>` or `<sitemap>` is taken.
pub fn parse_sitemap(xml: &str) -> Result<ParsedSitemap> {
    let mut parsed = ParsedSitemap::default();
    let mut saw_root = false;
    let mut stack: Vec<Tag> = Vec::new();
    let mut loc = String::new();

    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position();
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(ref e))) => {
                let tag = classify(&ns, e.local_name().as_ref());
                match tag {
                    Tag::Root => saw_root = true,
                    Tag::Loc => loc.clear(),
                    _ => {}
                }
                stack.push(tag);
            }
            Ok((_, Event::Text(ref e))) if stack.last() == Some(&Tag::Loc) => {
                let text = e
                    .unescape()
                    .map_err(|err| ScanError::ParseError(format!("sitemap <loc>: {}", err)))?;
                loc.push_str(&text);
            }
            Ok((_, Event::CData(e))) if stack.last() == Some(&Tag::Loc) => {
                loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok((_, Event::End(_))) => {
                if stack.pop() == Some(Tag::Loc) {
                    let value = loc.trim();
                    if !value.is_empty() {
                        match stack.last() {
                            Some(Tag::Url) => parsed.routes.push(value.to_string()),
                            Some(Tag::Sitemap) => parsed.child_sitemaps.push(value.to_string()),
                            _ => {}
                        }
                    }
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(ScanError::ParseError(format!(
                    "sitemap XML after byte {}: {}",
                    position, e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ScanError::ParseError(
            "document has no <urlset> or <sitemapindex> root".to_string(),
        ));
    }

    Ok(parsed)
}

/// Every `Sitemap:` directive in a robots.txt body, resolved and deduplicated in file order.
pub fn sitemap_directives(robots_txt: &str, robots_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    robots_txt
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            // inline comments: `Sitemap: /map.xml # primary`
            let value = value.split_once('#').map_or(value, |(url, _)| url);
            normalize(value, Some(robots_url))
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Sitemap routes that the crawl never reached.
///
/// A route counts as exposed once its URL was visited, whatever the response.
/// With `same_domain_only`, routes on other hosts are dropped.
pub fn unexposed_routes<'a>(
    routes: &'a [SitemapRoute],
    graph: &CrawlGraph,
    same_domain_only: bool,
) -> Vec<&'a SitemapRoute> {
    routes
        .iter()
        .filter(|route| !graph.is_visited(&route.url))
        .filter(|route| !same_domain_only || is_same_domain(&route.url, graph.start_url()))
        .collect()
}

pub struct SitemapCollector {
    fetcher: Fetcher,
}

impl SitemapCollector {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Collect sitemap routes for the host of `start_url`. Never fails; an
    /// unavailable sitemap yields an empty list.
    pub async fn collect_routes(&self, start_url: &Url) -> Vec<SitemapRoute> {
        match self.try_collect_routes(start_url).await {
            Ok(routes) => {
                info!("Collected {} sitemap routes", routes.len());
                routes
            }
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    pub async fn try_collect_routes(&self, start_url: &Url) -> Result<Vec<SitemapRoute>> {
        let candidates = self.locate_sitemaps(start_url).await?;

        let mut queue: VecDeque<(String, usize)> =
            candidates.into_iter().map(|url| (url, 0)).collect();
        let mut fetched_sitemaps = HashSet::new();
        let mut seen_routes = HashSet::new();
        let mut routes = Vec::new();
        let mut any_sitemap_read = false;

        while let Some((sitemap_url, nesting)) = queue.pop_front() {
            if fetched_sitemaps.len() >= MAX_SITEMAP_FILES {
                warn!("Sitemap file limit ({}) reached", MAX_SITEMAP_FILES);
                break;
            }
            if !fetched_sitemaps.insert(sitemap_url.clone()) {
                continue;
            }

            let response = match self.fetcher.fetch(&sitemap_url).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Could not fetch sitemap {}: {}", sitemap_url, e);
                    continue;
                }
            };
            let parsed = match parse_sitemap(&response.body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Could not parse sitemap {}: {}", sitemap_url, e);
                    continue;
                }
            };
            any_sitemap_read = true;

            let base = Url::parse(&response.final_url).ok();
            debug!(
                "Sitemap {} lists {} routes and {} child sitemaps",
                sitemap_url,
                parsed.routes.len(),
                parsed.child_sitemaps.len()
            );

            for loc in parsed.routes {
                if let Some(url) = normalize(&loc, base.as_ref())
                    && seen_routes.insert(url.clone())
                {
                    routes.push(SitemapRoute::new(url));
                }
            }

            if nesting < MAX_SITEMAP_NESTING {
                for child in parsed.child_sitemaps {
                    if let Some(url) = normalize(&child, base.as_ref()) {
                        queue.push_back((url, nesting + 1));
                    }
                }
            } else if !parsed.child_sitemaps.is_empty() {
                debug!("Not following sitemap index below {}", sitemap_url);
            }
        }

        if !any_sitemap_read {
            return Err(ScanError::SitemapUnavailable(format!(
                "no readable sitemap for {}",
                start_url.host_str().unwrap_or("unknown")
            )));
        }

        Ok(routes)
    }

    /// robots.txt directives if any, otherwise `/sitemap.xml` at the root.
    async fn locate_sitemaps(&self, start_url: &Url) -> Result<Vec<String>> {
        let robots_url = normalize_url("/robots.txt", Some(start_url))
            .ok_or_else(|| ScanError::InvalidUrl(start_url.to_string()))?;

        match self.fetcher.fetch(robots_url.as_str()).await {
            Ok(response) => {
                let directives = sitemap_directives(&response.body, &robots_url);
                if !directives.is_empty() {
                    debug!("robots.txt declares {} sitemap(s)", directives.len());
                    return Ok(directives);
                }
                debug!("robots.txt declares no sitemaps");
            }
            Err(e) => debug!("No robots.txt at {}: {}", robots_url, e),
        }

        let fallback = normalize("/sitemap.xml", Some(start_url))
            .ok_or_else(|| ScanError::InvalidUrl(start_url.to_string()))?;
        Ok(vec![fallback])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, path_regex},
    };

    fn collector() -> SitemapCollector {
        let fetcher = Fetcher::new(
            Duration::from_secs(2),
            5,
            crate::fetcher::DEFAULT_USER_AGENT,
        )
        .unwrap();
        SitemapCollector::new(fetcher)
    }

    fn urlset(locs: &[String]) -> String {
        let entries: String = locs
            .iter()
            .map(|l| format!("<url><loc>{}</loc></url>", l))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            entries
        )
    }

    async fn mount(server: &MockServer, at: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn start(server: &MockServer) -> Url {
        Url::parse(&server.uri()).unwrap()
    }

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc> https://example.com/a </loc><lastmod>2024-01-01</lastmod></url>
              <url><loc>https://example.com/b?x=1&amp;y=2</loc></url>
              <url><loc><![CDATA[https://example.com/c]]></loc></url>
            </urlset>"#;

        let parsed = parse_sitemap(xml).unwrap();
        assert_eq!(
            parsed.routes,
            vec![
                "https://example.com/a",
                "https://example.com/b?x=1&y=2",
                "https://example.com/c",
            ]
        );
        assert!(parsed.child_sitemaps.is_empty());
    }

    #[test]
    fn test_parse_sitemap_index_with_prefix() {
        let xml = r#"<sm:sitemapindex xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sm:sitemap><sm:loc>https://example.com/posts.xml</sm:loc></sm:sitemap>
            </sm:sitemapindex>"#;

        let parsed = parse_sitemap(xml).unwrap();
        assert!(parsed.routes.is_empty());
        assert_eq!(parsed.child_sitemaps, vec!["https://example.com/posts.xml"]);
    }

    #[test]
    fn test_parse_ignores_extension_locs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                    xmlns:image="http://www.google.com/schemas/sitemap-image/1.1"
                    xmlns:video="http://www.google.com/schemas/sitemap-video/1.1">
              <url>
                <loc>https://example.com/gallery</loc>
                <image:image><image:loc>https://example.com/img/cat.jpg</image:loc></image:image>
                <video:video><video:content_loc>https://example.com/v.mp4</video:content_loc></video:video>
              </url>
            </urlset>"#;

        let parsed = parse_sitemap(xml).unwrap();
        assert_eq!(parsed.routes, vec!["https://example.com/gallery"]);
        assert!(parsed.child_sitemaps.is_empty());
    }

    #[test]
    fn test_parse_takes_only_direct_loc_children() {
        let xml = r#"<urlset>
              <url><extra><loc>https://example.com/nested</loc></extra></url>
              <loc>https://example.com/stray</loc>
              <url><loc>https://example.com/real</loc></url>
            </urlset>"#;

        let parsed = parse_sitemap(xml).unwrap();
        assert_eq!(parsed.routes, vec!["https://example.com/real"]);
    }

    #[test]
    fn test_parse_rejects_malformed_and_foreign_documents() {
        assert!(matches!(
            parse_sitemap("<urlset><url><loc>https://x.org/</url></urlset>"),
            Err(ScanError::ParseError(_))
        ));
        assert!(matches!(
            parse_sitemap("<html><body>Not found</body></html>"),
            Err(ScanError::ParseError(_))
        ));
    }

    #[test]
    fn test_sitemap_directives() {
        let robots_url = Url::parse("https://example.com/robots.txt").unwrap();
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sm1.xml\n\
                      sitemap: /sm2.xml\nSITEMAP:https://example.com/sm1.xml\n# Sitemap: /commented.xml";

        assert_eq!(
            sitemap_directives(robots, &robots_url),
            vec!["https://example.com/sm1.xml", "https://example.com/sm2.xml"]
        );
    }

    #[test]
    fn test_sitemap_directive_inline_comment() {
        let robots_url = Url::parse("https://example.com/robots.txt").unwrap();
        let robots = "Sitemap: https://example.com/s.xml # main
Sitemap: /news.xml#news";

        assert_eq!(
            sitemap_directives(robots, &robots_url),
            vec!["https://example.com/s.xml", "https://example.com/news.xml"]
        );
    }

    #[tokio::test]
    async fn test_collect_from_robots_directive() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(
            &server,
            "/robots.txt",
            200,
            format!("User-agent: *\nSitemap: {}/custom-map.xml\n", uri),
        )
        .await;
        mount(
            &server,
            "/custom-map.xml",
            200,
            urlset(&[format!("{}/hidden/", uri), format!("{}/public", uri)]),
        )
        .await;

        let routes = collector().collect_routes(&start(&server)).await;
        let urls: Vec<&str> = routes.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![format!("{}/hidden", uri), format!("{}/public", uri)]
        );
        assert_eq!(routes[0].path, "/hidden");
    }

    #[tokio::test]
    async fn test_collect_falls_back_to_sitemap_xml() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(&server, "/robots.txt", 404, String::new()).await;
        mount(&server, "/sitemap.xml", 200, urlset(&[format!("{}/only", uri)])).await;

        let routes = collector().collect_routes(&start(&server)).await;
        assert_eq!(routes, vec![SitemapRoute::new(format!("{}/only", uri))]);
    }

    #[tokio::test]
    async fn test_robots_without_directive_falls_back() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(&server, "/robots.txt", 200, "User-agent: *\nDisallow:\n".into()).await;
        mount(&server, "/sitemap.xml", 200, urlset(&[format!("{}/x", uri)])).await;

        let routes = collector().collect_routes(&start(&server)).await;
        assert_eq!(routes.len(), 1);
    }

    #[tokio::test]
    async fn test_collect_follows_sitemap_index() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(&server, "/robots.txt", 404, String::new()).await;
        mount(
            &server,
            "/sitemap.xml",
            200,
            format!(
                "<sitemapindex><sitemap><loc>{0}/pages.xml</loc></sitemap>\
                 <sitemap><loc>{0}/posts.xml</loc></sitemap>\
                 <sitemap><loc>{0}/pages.xml</loc></sitemap></sitemapindex>",
                uri
            ),
        )
        .await;
        mount(
            &server,
            "/pages.xml",
            200,
            urlset(&[format!("{}/about", uri), format!("{}/team", uri)]),
        )
        .await;
        mount(
            &server,
            "/posts.xml",
            200,
            urlset(&[format!("{}/blog/1", uri), format!("{}/about/", uri)]),
        )
        .await;

        let routes = collector().collect_routes(&start(&server)).await;
        let paths: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/about", "/team", "/blog/1"]);
    }

    #[tokio::test]
    async fn test_collect_reads_every_robots_directive() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(
            &server,
            "/robots.txt",
            200,
            format!(
                "User-agent: *\nSitemap: {0}/pages.xml\nDisallow: /tmp\nSitemap: {0}/news.xml\n",
                uri
            ),
        )
        .await;
        mount(&server, "/pages.xml", 200, urlset(&[format!("{}/about", uri)])).await;
        mount(
            &server,
            "/news.xml",
            200,
            urlset(&[format!("{}/news/1", uri), format!("{}/about", uri)]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[])))
            .expect(0)
            .mount(&server)
            .await;

        let routes = collector().collect_routes(&start(&server)).await;
        let paths: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/about", "/news/1"]);
    }

    /// `<urlset>` carrying one route plus a pointer to the next level.
    fn chained(uri: &str, level: usize) -> String {
        format!(
            "<urlset><url><loc>{0}/route{1}</loc></url>\
             <sitemap><loc>{0}/level{2}.xml</loc></sitemap></urlset>",
            uri,
            level,
            level + 1
        )
    }

    #[tokio::test]
    async fn test_sitemap_nesting_is_bounded() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(&server, "/robots.txt", 404, String::new()).await;
        mount(&server, "/sitemap.xml", 200, chained(&uri, 0)).await;
        for level in 1..=MAX_SITEMAP_NESTING {
            mount(&server, &format!("/level{}.xml", level), 200, chained(&uri, level)).await;
        }
        let too_deep = MAX_SITEMAP_NESTING + 1;
        Mock::given(method("GET"))
            .and(path(format!("/level{}.xml", too_deep)))
            .respond_with(ResponseTemplate::new(200).set_body_string(chained(&uri, too_deep)))
            .expect(0)
            .mount(&server)
            .await;

        let routes = collector().collect_routes(&start(&server)).await;
        let paths: Vec<String> = routes.iter().map(|r| r.path.clone()).collect();
        let expected: Vec<String> = (0..=MAX_SITEMAP_NESTING)
            .map(|level| format!("/route{}", level))
            .collect();
        assert_eq!(paths, expected);
    }

    #[tokio::test]
    async fn test_sitemap_file_limit() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(&server, "/robots.txt", 404, String::new()).await;
        let children: String = (0..MAX_SITEMAP_FILES + 10)
            .map(|i| format!("<sitemap><loc>{}/child-{}.xml</loc></sitemap>", uri, i))
            .collect();
        mount(
            &server,
            "/sitemap.xml",
            200,
            format!("<sitemapindex>{}</sitemapindex>", children),
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/child-\d+\.xml$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&[format!("{}/shared", uri)])),
            )
            .mount(&server)
            .await;

        let routes = collector().collect_routes(&start(&server)).await;
        assert_eq!(routes.len(), 1);

        let child_fetches = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().starts_with("/child-"))
            .count();
        // the index itself is the first of the fetched files
        assert_eq!(child_fetches, MAX_SITEMAP_FILES - 1);
    }

    #[tokio::test]
    async fn test_unavailable_sitemap_is_empty() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", 404, String::new()).await;
        mount(&server, "/sitemap.xml", 500, String::new()).await;

        let collector = collector();
        assert!(collector.collect_routes(&start(&server)).await.is_empty());
        assert!(matches!(
            collector.try_collect_routes(&start(&server)).await,
            Err(ScanError::SitemapUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_sitemap_is_empty() {
        let server = MockServer::start().await;
        mount(&server, "/robots.txt", 404, String::new()).await;
        mount(&server, "/sitemap.xml", 200, "<urlset><url><loc>oops".into()).await;

        assert!(collector().collect_routes(&start(&server)).await.is_empty());
    }

    #[test]
    fn test_unexposed_routes() {
        let mut graph = CrawlGraph::new("https://example.com/");
        graph.discover("https://example.com/", 0);
        graph.record_fetched("https://example.com/", 200, None);
        graph.discover("https://example.com/about", 1);
        graph.record_fetched("https://example.com/about", 200, None);
        graph.discover("https://example.com/linked-only", 2);

        let routes = vec![
            SitemapRoute::new("https://example.com/about".into()),
            SitemapRoute::new("https://example.com/secret".into()),
            SitemapRoute::new("https://example.com/linked-only".into()),
            SitemapRoute::new("https://cdn.example.com/asset".into()),
        ];

        let restricted: Vec<&str> = unexposed_routes(&routes, &graph, true)
            .into_iter()
            .map(|r| r.url.as_str())
            .collect();
        assert_eq!(
            restricted,
            vec!["https://example.com/secret", "https://example.com/linked-only"]
        );

        assert_eq!(unexposed_routes(&routes, &graph, false).len(), 3);
    }
}

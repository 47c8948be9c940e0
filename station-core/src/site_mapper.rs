use crate::bot::{Bot, BotInfo, BotRun, RunContext};
use crate::error::{ParamError, Result};
use crate::report::{self, ReportFormat};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use station_scanner::config::DEFAULT_MAX_DEPTH;
use station_scanner::sitemap::unexposed_routes;
use station_scanner::{
    CrawlConfig, CrawlGraph, Crawler, ProgressCallback, ScanError, SitemapCollector, SitemapRoute,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const BOT_NAME: &str = "site_mapper";

/// Typed parameters of the site mapper bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMapperParams {
    pub start_url: String,
    pub max_depth: usize,
    pub same_domain_only: bool,
}

impl SiteMapperParams {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            same_domain_only: true,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_same_domain_only(mut self, same_domain_only: bool) -> Self {
        self.same_domain_only = same_domain_only;
        self
    }

    /// Coerce positional `[start_url] [max_depth] [same_domain_only]` strings.
    pub fn from_params(params: &[String]) -> std::result::Result<Self, ParamError> {
        if params.len() > 3 {
            return Err(ParamError::TooManyParams {
                expected: 3,
                got: params.len(),
            });
        }

        let start_url = params
            .first()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(ParamError::MissingStartUrl)?;

        let mut parsed = Self::new(start_url);

        if let Some(depth) = params.get(1) {
            parsed.max_depth = depth
                .trim()
                .parse::<usize>()
                .map_err(|_| ParamError::InvalidDepth(depth.clone()))?;
        }

        if let Some(flag) = params.get(2) {
            parsed.same_domain_only =
                parse_flag(flag).ok_or_else(|| ParamError::InvalidFlag(flag.clone()))?;
        }

        Ok(parsed)
    }

    pub fn crawl_config(&self, ctx: &RunContext) -> CrawlConfig {
        CrawlConfig::new(self.start_url.clone())
            .with_max_depth(self.max_depth)
            .with_same_domain_only(self.same_domain_only)
            .with_max_pages(ctx.max_pages)
            .with_timeout(ctx.timeout)
            .with_politeness_delay(ctx.politeness_delay)
    }
}

/// `true/false`, `yes/no`, `1/0`, `on/off`, any case.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// The in-memory result of one site mapper invocation.
#[derive(Debug, Clone)]
pub struct SiteMapRun {
    pub params: SiteMapperParams,
    pub graph: CrawlGraph,
    /// Every route found in the sitemap(s), exposed or not.
    pub routes: Vec<SitemapRoute>,
    pub cap_reached: bool,
    pub cancelled: bool,
    pub max_pages: usize,
}

impl SiteMapRun {
    pub fn unexposed_routes(&self) -> Vec<&SitemapRoute> {
        unexposed_routes(&self.routes, &self.graph, self.params.same_domain_only)
    }

    pub fn summary(&self) -> SiteMapSummary {
        SiteMapSummary {
            status: if self.cancelled { "cancelled" } else { "success" }.to_string(),
            start: self.graph.start_url().to_string(),
            pages: self.graph.pages_visited(),
            successful_pages: self.graph.successful_pages(),
            edges: self.graph.edges().len(),
            unexposed_routes: self.unexposed_routes().len(),
            cap_reached: self.cap_reached,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMapSummary {
    pub status: String,
    pub start: String,
    pub pages: usize,
    pub successful_pages: usize,
    pub edges: usize,
    pub unexposed_routes: usize,
    pub cap_reached: bool,
}

/// Crawl from `params.start_url`, then collect sitemap routes for the same host.
///
/// The only fatal error is a start URL that cannot be normalized.
pub async fn run_site_mapper(
    params: SiteMapperParams,
    ctx: &RunContext,
) -> std::result::Result<SiteMapRun, ScanError> {
    let config = params.crawl_config(ctx);
    let max_pages = config.max_pages;

    let progress_bar = if ctx.show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let mut crawler = Crawler::new(config)?.with_stop_flag(ctx.stop_flag.clone());

    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let callback: ProgressCallback = Arc::new(move |page: usize, url: String| {
            pb_clone.set_message(format!("Crawling [{}/{}] {}", page, max_pages, url));
        });
        crawler = crawler.with_progress_callback(callback);
    }

    let outcome = crawler.crawl().await;

    let routes = if outcome.cancelled {
        info!("Skipping sitemap discovery for cancelled crawl");
        Vec::new()
    } else {
        if let Some(ref pb) = progress_bar {
            pb.set_message("Reading robots.txt and sitemap...");
        }
        SitemapCollector::new(crawler.fetcher().clone())
            .collect_routes(crawler.start_url())
            .await
    };

    if let Some(ref pb) = progress_bar {
        pb.finish_and_clear();
    }

    Ok(SiteMapRun {
        params,
        graph: outcome.graph,
        routes,
        cap_reached: outcome.cap_reached,
        cancelled: outcome.cancelled,
        max_pages,
    })
}

/// Crawls a site from a start URL and reports the URL list, unexposed sitemap
/// routes and a Mermaid diagram of the link graph.
pub struct SiteMapper;

#[async_trait]
impl Bot for SiteMapper {
    fn info(&self) -> BotInfo {
        BotInfo {
            name: BOT_NAME.to_string(),
            description: "Crawls a site map from a start URL and prints URL list + Mermaid diagram"
                .to_string(),
            author: "Scraper Kit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            usage: "<start_url> [max_depth=2] [same_domain_only=true]".to_string(),
        }
    }

    async fn run(&self, params: &[String], ctx: &RunContext) -> Result<BotRun> {
        let params = SiteMapperParams::from_params(params)?;
        let run = run_site_mapper(params, ctx).await?;

        let report = match ctx.format {
            ReportFormat::Text => report::render_text(&run),
            ReportFormat::Json => report::render_json(&run)?,
        };

        Ok(BotRun {
            report,
            summary: serde_json::to_value(run.summary())?,
        })
    }
}

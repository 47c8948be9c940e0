use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use crate::extract::{ExtractedPage, extract_links};
use crate::fetcher::Fetcher;
use crate::graph::CrawlGraph;
use crate::normalize::{is_same_domain, normalize_url};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use url::Url;

/// Called before each fetch with the 1-based page number and the URL.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Everything one crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub graph: CrawlGraph,
    /// The safety cap stopped the crawl with work still queued.
    pub cap_reached: bool,
    /// The stop flag was raised before the queue drained.
    pub cancelled: bool,
}

impl CrawlOutcome {
    pub fn pages_visited(&self) -> usize {
        self.graph.pages_visited()
    }
}

/// Sequential breadth-first crawler.
///
/// Pages are visited strictly in FIFO order of discovery, so every node's depth
/// is the length of the shortest link path from the start URL. One fetch is in
/// flight at a time and a politeness delay separates consecutive fetches.
pub struct Crawler {
    fetcher: Fetcher,
    config: CrawlConfig,
    start: Url,
    progress_callback: Option<ProgressCallback>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl Crawler {
    /// Fails only if the start URL cannot be normalized or the HTTP client cannot be built.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let start = normalize_url(&config.start_url, None).ok_or_else(|| {
            ScanError::InvalidUrl(format!("cannot crawl from '{}'", config.start_url))
        })?;
        let fetcher = Fetcher::new(config.timeout, config.max_redirects, &config.user_agent)?;

        Ok(Self {
            fetcher,
            config,
            start,
            progress_callback: None,
            stop_flag: None,
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Checked once per dequeue, never while a fetch is in flight.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn start_url(&self) -> &Url {
        &self.start
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn should_stop(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub async fn crawl(&self) -> CrawlOutcome {
        let start_url = self.start.to_string();
        let max_depth = self.config.max_depth;
        let max_pages = self.config.max_pages;

        info!(
            "Starting crawl of {} (max depth {}, cap {} pages, same domain only: {})",
            start_url, max_depth, max_pages, self.config.same_domain_only
        );

        let mut graph = CrawlGraph::new(start_url.clone());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut pages_visited = 0usize;
        let mut cancelled = false;

        graph.discover(&start_url, 0);
        queue.push_back((start_url.clone(), 0));

        while !queue.is_empty() && pages_visited < max_pages {
            if self.should_stop() {
                info!("Crawl cancelled with {} URLs still queued", queue.len());
                cancelled = true;
                break;
            }

            let Some((url, depth)) = queue.pop_front() else {
                break;
            };
            if !visited.insert(url.clone()) {
                continue;
            }

            graph.mark_fetching(&url);
            if let Some(ref callback) = self.progress_callback {
                callback(pages_visited + 1, url.clone());
            }

            let fetched = self.fetcher.fetch(&url).await;
            pages_visited += 1;

            match fetched {
                Ok(response) => {
                    let page = if response.is_html() {
                        let base = Url::parse(&response.final_url)
                            .unwrap_or_else(|_| self.start.clone());
                        extract_links(&response.body, &base).unwrap_or_else(|e| {
                            warn!("Could not parse {}: {}", url, e);
                            ExtractedPage::default()
                        })
                    } else {
                        debug!(
                            "Skipping link extraction for {} ({:?})",
                            url, response.content_type
                        );
                        ExtractedPage::default()
                    };

                    graph.record_fetched(&url, response.status_code, page.title);

                    for link in page.links {
                        if self.config.same_domain_only && !is_same_domain(&link, &start_url) {
                            debug!("  -> {} is cross-domain, skipping", link);
                            continue;
                        }
                        graph.add_edge(&url, &link);

                        // First discovery fixes the depth; later sightings are deeper or equal.
                        if graph.discover(&link, depth + 1) && depth < max_depth {
                            debug!("  -> queuing {} at depth {}", link, depth + 1);
                            queue.push_back((link, depth + 1));
                        }
                    }
                }
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    graph.record_failed(&url, &e);
                }
            }

            if !queue.is_empty()
                && pages_visited < max_pages
                && !self.config.politeness_delay.is_zero()
            {
                tokio::time::sleep(self.config.politeness_delay).await;
            }
        }

        let cap_reached = !cancelled && pages_visited >= max_pages && !queue.is_empty();
        if cap_reached {
            warn!(
                "Safety cap of {} pages reached, {} URLs left unvisited",
                max_pages,
                queue.len()
            );
        }

        info!(
            "Crawl complete. Visited {} pages ({} ok), {} edges",
            graph.pages_visited(),
            graph.successful_pages(),
            graph.edges().len()
        );

        CrawlOutcome {
            graph,
            cap_reached,
            cancelled,
        }
    }
}

use crate::fetcher::DEFAULT_USER_AGENT;
use std::time::Duration;

/// Safety cap on pages fetched in one crawl.
pub const DEFAULT_MAX_PAGES: usize = 200;
pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_POLITENESS_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Parameters of a single crawl. Owned by the [`Crawler`](crate::Crawler) and
/// never changed once the crawl starts.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: String,
    pub max_depth: usize,
    pub same_domain_only: bool,
    pub max_pages: usize,
    pub timeout: Duration,
    pub politeness_delay: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl CrawlConfig {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            same_domain_only: true,
            max_pages: DEFAULT_MAX_PAGES,
            timeout: DEFAULT_TIMEOUT,
            politeness_delay: DEFAULT_POLITENESS_DELAY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_same_domain_only(mut self, same_domain_only: bool) -> Self {
        self.same_domain_only = same_domain_only;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

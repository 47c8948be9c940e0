use crate::error::{FetchError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Station-SiteMapper/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/scraper-kit/station)"
);

/// A successful GET. Status is always below 400 here; anything else is a [`FetchError`].
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// URL after redirects; relative links on the page resolve against this.
    pub final_url: String,
}

impl FetchResponse {
    pub fn is_html(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml+xml")
            }
            None => self.body.trim_start().starts_with('<'),
        }
    }
}

/// Single-shot HTTP GET with a bounded timeout and redirect chain.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_redirects: usize, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        debug!("{} answered {} in {:?}", url, status_code, start.elapsed());
        if status_code >= 400 {
            return Err(FetchError::HttpStatus(status_code));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await?;

        Ok(FetchResponse {
            status_code,
            content_type,
            body,
            final_url,
        })
    }
}

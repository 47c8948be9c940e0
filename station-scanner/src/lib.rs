pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod graph;
pub mod normalize;
pub mod sitemap;

pub use config::CrawlConfig;
pub use crawler::{CrawlOutcome, Crawler, ProgressCallback};
pub use error::{FetchError, FetchErrorKind, ScanError};
pub use fetcher::Fetcher;
pub use graph::{CrawlEdge, CrawlGraph, CrawlNode, NodeState};
pub use sitemap::{SitemapCollector, SitemapRoute};

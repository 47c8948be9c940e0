//! Bot capability trait and the registry that maps names to bots.
//!
//! The registry is built once at startup and handed to whatever dispatches
//! commands. There is no global bot list.

use crate::error::{BotError, Result};
use crate::report::ReportFormat;
use crate::site_mapper::SiteMapper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    /// Positional parameter synopsis, e.g. `<start_url> [max_depth]`.
    pub usage: String,
}

/// What a bot hands back to its caller. Printing or saving is the caller's job.
#[derive(Debug, Clone)]
pub struct BotRun {
    pub report: String,
    pub summary: serde_json::Value,
}

/// Caller-side knobs that are not bot parameters.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub format: ReportFormat,
    pub show_progress: bool,
    /// Raised (e.g. on Ctrl-C) to stop a bot at its next safe point.
    pub stop_flag: Arc<AtomicBool>,
    pub max_pages: usize,
    pub timeout: Duration,
    pub politeness_delay: Duration,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            format: ReportFormat::Text,
            show_progress: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
            max_pages: station_scanner::config::DEFAULT_MAX_PAGES,
            timeout: station_scanner::config::DEFAULT_TIMEOUT,
            politeness_delay: station_scanner::config::DEFAULT_POLITENESS_DELAY,
        }
    }
}

#[async_trait]
pub trait Bot: Send + Sync {
    fn info(&self) -> BotInfo;

    async fn run(&self, params: &[String], ctx: &RunContext) -> Result<BotRun>;
}

#[derive(Default)]
pub struct BotRegistry {
    bots: BTreeMap<String, Box<dyn Bot>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every bot shipped in this crate.
    pub fn with_default_bots() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SiteMapper));
        registry
    }

    /// Adds `bot` under its own name, returning any bot it replaced.
    pub fn register(&mut self, bot: Box<dyn Bot>) -> Option<Box<dyn Bot>> {
        let name = bot.info().name;
        self.bots.insert(name, bot)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Bot> {
        self.bots.get(name).map(|bot| bot.as_ref())
    }

    /// Sorted by name.
    pub fn list(&self) -> Vec<BotInfo> {
        self.bots.values().map(|bot| bot.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    pub async fn run(&self, name: &str, params: &[String], ctx: &RunContext) -> Result<BotRun> {
        let bot = self
            .get(name)
            .ok_or_else(|| BotError::UnknownBot(name.to_string()))?;
        info!("Running bot {} with {} params", name, params.len());
        bot.run(params, ctx).await
    }
}

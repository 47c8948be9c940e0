pub mod bot;
pub mod error;
pub mod report;
pub mod site_mapper;

pub use bot::{Bot, BotInfo, BotRegistry, BotRun, RunContext};
pub use error::{BotError, ParamError};
pub use report::ReportFormat;
pub use site_mapper::{SiteMapRun, SiteMapSummary, SiteMapper, SiteMapperParams, run_site_mapper};

use station_scanner::ScanError;
use thiserror::Error;

/// Positional `--params` that could not be coerced into a typed bot config.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing required parameter: start_url")]
    MissingStartUrl,

    #[error("invalid max_depth '{0}': expected a non-negative integer")]
    InvalidDepth(String),

    #[error("invalid same_domain_only '{0}': expected true or false")]
    InvalidFlag(String),

    #[error("expected at most {expected} parameters, got {got}")]
    TooManyParams { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Bot '{0}' not found")]
    UnknownBot(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;

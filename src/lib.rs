//! Telemetr-Harvest: a channel catalog harvester
//!
//! This crate walks the paginated channel catalog on telemetr.me, resolves each
//! listed channel to a detailed record (structured API first, page scrape as
//! fallback), and persists the aggregated records as JSON and CSV. The crawl runs
//! as a background job controlled through a small HTTP API.

pub mod config;
pub mod crawler;
pub mod ledger;
pub mod output;
pub mod server;
pub mod state;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("API error: {0}")]
    Api(String),

    #[error("Extraction failed for {url}: {message}")]
    Extract { url: String, message: String },

    #[error("Quota exhausted: {name} ({description})")]
    QuotaExhausted { name: String, description: String },

    #[error("Nothing new to do: all {skipped} listed channels were already processed")]
    NothingNew { skipped: usize },

    #[error("No channels matched: filters may be too strict or the site is unreachable")]
    NoMatches,

    #[error("No records produced: all {attempted} attempted channels failed to resolve")]
    AllFailed { attempted: usize },

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true for the designed stopping conditions that explain an empty
    /// batch, as opposed to genuine failures.
    pub fn is_empty_condition(&self) -> bool {
        matches!(
            self,
            Self::NothingNew { .. } | Self::NoMatches | Self::AllFailed { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{AppConfig, FilterSet};
pub use crawler::{AdminContact, ChannelRecord, DescriptionFragment};
pub use state::{RunState, StopSignal};

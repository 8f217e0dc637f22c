//! Configuration module for Telemetr-Harvest
//!
//! This module handles two separate stores: the application configuration
//! (`config.toml`, loaded once at startup) and the filter configuration
//! (`filters.toml`, replaced wholesale by the control plane and re-read fresh at
//! the start of every crawl run).
//!
//! # Example
//!
//! ```no_run
//! use telemetr_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Listing base URL: {}", config.site.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AppConfig, FilterSet, HttpConfig, OutputConfig, ServerConfig, SiteConfig};

// Re-export parser functions
pub use parser::{load_config, FilterStore};

// Re-export validation entry points
pub use validation::validate_filters;

//! Crawler module - catalog walking and channel resolution
//!
//! This module contains the crawl driver and its collaborators:
//! - `driver`: the pagination-and-resume crawl loop (the heart of the crate)
//! - `listing`: catalog page fetching and identifier extraction
//! - `detail`: per-channel resolution (structured API first, scrape fallback)
//! - `quota`: profile-page usage limits that can halt a crawl

pub mod detail;
pub mod driver;
pub mod listing;
pub mod quota;

use crate::config::HttpConfig;
use crate::{HarvestError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use driver::{Driver, RunOutcome, RunReport};

/// One fragment of a channel description: a run of text with the link it was
/// anchored to, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionFragment {
    pub text: String,
    pub link: Option<String>,
}

impl DescriptionFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
        }
    }

    pub fn linked(text: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: Some(link.into()),
        }
    }
}

/// An administrator/contact reference extracted from a channel description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminContact {
    /// Display label, usually the @handle when one is derivable
    pub label: String,
    /// Canonical direct-messaging link
    pub link: String,
}

/// Detail record for a single resolved channel
///
/// Built once per successfully resolved identifier and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub title: String,
    /// Canonical t.me link for the channel
    pub link: String,
    /// Normalized handle, always with a leading '@'
    pub handle: String,
    /// Subscriber count; None means the source did not expose one
    pub subscribers: Option<i64>,
    pub description: Vec<DescriptionFragment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admins: Option<Vec<AdminContact>>,
}

/// Builds the shared HTTP client used for all catalog, profile, and API calls
///
/// The catalog site expects a browser-like user agent, an Accept-Language, and a
/// session cookie; all of them ride along as default headers so every call site
/// stays uniform.
pub fn build_http_client(http: &HttpConfig, base_url: &str) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );

    if let Ok(value) = HeaderValue::from_str(&http.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    if let Ok(value) = HeaderValue::from_str(base_url) {
        headers.insert(REFERER, value);
    }

    if let Some(cookie) = &http.cookie {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| HarvestError::Api(format!("invalid cookie header: {}", e)))?;
        headers.insert(COOKIE, value);
    }

    let client = Client::builder()
        .user_agent(http.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Fetches a document body, mapping transport and status failures to crate errors
pub(crate) async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await.map_err(|e| HarvestError::Http {
        url: url.to_string(),
        source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| HarvestError::Http {
        url: url.to_string(),
        source: e,
    })
}

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Path to the filter configuration store (re-read at the start of each run)
    #[serde(rename = "filters-path", default = "default_filters_path")]
    pub filters_path: String,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the catalog site (listing and channel pages)
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the structured API
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token for the structured API; the TELEMETR_API_TOKEN environment
    /// variable takes precedence when set
    #[serde(rename = "api-token")]
    pub api_token: Option<String>,

    /// Name of the profile limit whose exhaustion must stop the crawl.
    /// Matched case-insensitively as a substring of the limit label.
    #[serde(rename = "gate-limit-name", default = "default_gate_limit_name")]
    pub gate_limit_name: String,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language sent with every catalog request
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Session cookie for the catalog site (listing pages require one)
    pub cookie: Option<String>,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the JSON and CSV result artifacts
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Path to the processed-channel ledger database
    #[serde(rename = "ledger-path")]
    pub ledger_path: String,
}

/// Control-plane server bind configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_filters_path() -> String {
    "./filters.toml".to_string()
}

fn default_base_url() -> String {
    "https://telemetr.me".to_string()
}

fn default_api_base_url() -> String {
    "https://api.telemetr.me".to_string()
}

fn default_gate_limit_name() -> String {
    // The profile page labels the per-day channel view allowance with this phrase;
    // it is the only limit that hard-blocks further catalog reads.
    "Просмотры каналов".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/138.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "ru-RU,ru;q=0.9".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Filter configuration for a crawl run
///
/// Replaced wholesale by the control plane, never mutated mid-run. Unknown fields
/// are rejected at the boundary; the listing URL builder additionally passes only
/// recognized fields through to the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    /// Explicit channel links, one per entry (sent CRLF-joined)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants_from: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants_to: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub views_post_from: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views_post_to: Option<u64>,

    /// Engagement rate bounds, percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub er_from: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub er_to: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions_week_from: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions_week_to: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_direction: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_bot_added: Option<String>,

    /// Minimum share of male audience, percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex_m_from: Option<u8>,
    /// Minimum share of female audience, percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex_w_from: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_code: Option<String>,

    /// First catalog page to visit
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Last catalog page to visit (inclusive); None means unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_page: Option<u32>,
}

fn default_start_page() -> u32 {
    1
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            categories: None,
            links: None,
            title: None,
            about: None,
            participants_from: None,
            participants_to: None,
            views_post_from: None,
            views_post_to: None,
            er_from: None,
            er_to: None,
            mentions_week_from: None,
            mentions_week_to: None,
            order_column: None,
            order_direction: None,
            channel_type: None,
            moderate: None,
            verified: None,
            detailed_bot_added: None,
            sex_m_from: None,
            sex_w_from: None,
            lang_code: None,
            start_page: default_start_page(),
            end_page: None,
        }
    }
}

use crate::config::types::{AppConfig, FilterSet};
use crate::ConfigError;
use url::Url;

/// Validates the application configuration
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    validate_site_url(&config.site.base_url, "site.base-url")?;
    validate_site_url(&config.site.api_base_url, "site.api-base-url")?;

    if config.site.gate_limit_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site.gate-limit-name cannot be empty".to_string(),
        ));
    }

    if config.http.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http.timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.output.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output.data-dir cannot be empty".to_string(),
        ));
    }

    if config.output.ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "output.ledger-path cannot be empty".to_string(),
        ));
    }

    if config.filters_path.is_empty() {
        return Err(ConfigError::Validation(
            "filters-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_site_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{}: '{}' must use http(s)",
            field, value
        )));
    }

    Ok(())
}

/// Validates a filter set before it is persisted or used for a run
///
/// Range fields must satisfy `from <= to` when both ends are present, percentage
/// fields must lie in [0, 100], and the page window must be well-formed.
pub fn validate_filters(filters: &FilterSet) -> Result<(), ConfigError> {
    validate_range(
        "participants",
        filters.participants_from,
        filters.participants_to,
    )?;
    validate_range("views_post", filters.views_post_from, filters.views_post_to)?;
    validate_range(
        "mentions_week",
        filters.mentions_week_from,
        filters.mentions_week_to,
    )?;

    validate_percent("er_from", filters.er_from)?;
    validate_percent("er_to", filters.er_to)?;
    if let (Some(from), Some(to)) = (filters.er_from, filters.er_to) {
        if from > to {
            return Err(ConfigError::Validation(format!(
                "er_from ({}) must not exceed er_to ({})",
                from, to
            )));
        }
    }

    validate_percent("sex_m_from", filters.sex_m_from.map(f64::from))?;
    validate_percent("sex_w_from", filters.sex_w_from.map(f64::from))?;

    validate_choice(
        "order_direction",
        filters.order_direction.as_deref(),
        &["ASC", "DESC"],
    )?;
    validate_choice(
        "channel_type",
        filters.channel_type.as_deref(),
        &["opened", "closed", "all"],
    )?;
    validate_choice("moderate", filters.moderate.as_deref(), &["yes", "no", "all"])?;
    validate_choice("verified", filters.verified.as_deref(), &["yes", "no", "all"])?;
    validate_choice(
        "detailed_bot_added",
        filters.detailed_bot_added.as_deref(),
        &["yes", "no", "all"],
    )?;

    if filters.start_page < 1 {
        return Err(ConfigError::Validation(format!(
            "start_page must be >= 1, got {}",
            filters.start_page
        )));
    }

    if let Some(end) = filters.end_page {
        if end < filters.start_page {
            return Err(ConfigError::Validation(format!(
                "end_page ({}) must not be below start_page ({})",
                end, filters.start_page
            )));
        }
    }

    Ok(())
}

fn validate_range(name: &str, from: Option<u64>, to: Option<u64>) -> Result<(), ConfigError> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ConfigError::Validation(format!(
                "{}_from ({}) must not exceed {}_to ({})",
                name, from, name, to
            )));
        }
    }
    Ok(())
}

fn validate_percent(name: &str, value: Option<f64>) -> Result<(), ConfigError> {
    if let Some(v) = value {
        if !(0.0..=100.0).contains(&v) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 0 and 100, got {}",
                name, v
            )));
        }
    }
    Ok(())
}

fn validate_choice(
    name: &str,
    value: Option<&str>,
    allowed: &[&str],
) -> Result<(), ConfigError> {
    if let Some(v) = value {
        if !allowed.contains(&v) {
            return Err(ConfigError::Validation(format!(
                "{} must be one of {:?}, got '{}'",
                name, allowed, v
            )));
        }
    }
    Ok(())
}

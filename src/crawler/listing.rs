//! Catalog listing fetcher
//!
//! Builds listing-page URLs from a filter set and extracts the per-row channel
//! identifiers. Only recognized filter fields become query parameters; anything
//! else never reaches the site.

use crate::config::FilterSet;
use crate::{ConfigError, HarvestError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

/// Number of rows on a full catalog page. A page with fewer rows is taken to be
/// the catalog's last page.
pub const FULL_PAGE_SIZE: usize = 30;

/// Builds the listing URL for one catalog page
///
/// Categories select a dedicated path (`/channels/cat/<list>/`); every other
/// recognized filter becomes a query parameter. The `links` list is CRLF-joined,
/// matching the site's textarea submission format.
pub fn build_listing_url(base_url: &str, filters: &FilterSet, page: u32) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", base_url, e)))
        .map_err(HarvestError::from)?;

    match &filters.categories {
        Some(categories) if !categories.is_empty() => {
            url.set_path(&format!("/channels/cat/{}/", categories.join(",")));
        }
        _ => url.set_path("/channels/"),
    }

    {
        let mut query = url.query_pairs_mut();

        if let Some(links) = &filters.links {
            if !links.is_empty() {
                query.append_pair("links", &links.join("\r\n"));
            }
        }

        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                query.append_pair(key, &v);
            }
        };

        push("title", filters.title.clone());
        push("about", filters.about.clone());
        push(
            "participants_from",
            filters.participants_from.map(|v| v.to_string()),
        );
        push(
            "participants_to",
            filters.participants_to.map(|v| v.to_string()),
        );
        push(
            "views_post_from",
            filters.views_post_from.map(|v| v.to_string()),
        );
        push(
            "views_post_to",
            filters.views_post_to.map(|v| v.to_string()),
        );
        push("er_from", filters.er_from.map(|v| v.to_string()));
        push("er_to", filters.er_to.map(|v| v.to_string()));
        push(
            "mentions_week_from",
            filters.mentions_week_from.map(|v| v.to_string()),
        );
        push(
            "mentions_week_to",
            filters.mentions_week_to.map(|v| v.to_string()),
        );
        push("order_column", filters.order_column.clone());
        push("order_direction", filters.order_direction.clone());
        push("channel_type", filters.channel_type.clone());
        push("moderate", filters.moderate.clone());
        push("verified", filters.verified.clone());
        push("detailed_bot_added", filters.detailed_bot_added.clone());
        push("sex_m_from", filters.sex_m_from.map(|v| v.to_string()));
        push("sex_w_from", filters.sex_w_from.map(|v| v.to_string()));
        push("lang_code", filters.lang_code.clone());
        push("page", Some(page.to_string()));
    }

    Ok(url)
}

/// Fetches one listing page and returns its channel identifiers in row order
///
/// An empty vec means the page holds no recognizable rows (end of catalog), not
/// an error. Transport failures and non-2xx statuses propagate.
pub async fn fetch_page(
    client: &Client,
    base_url: &str,
    filters: &FilterSet,
    page: u32,
) -> Result<Vec<String>> {
    let url = build_listing_url(base_url, filters, page)?;
    tracing::debug!("Fetching listing page {}: {}", page, url);

    let body = super::fetch_text(client, url.as_str()).await?;
    let document = Html::parse_document(&body);

    Ok(extract_identifiers(&document))
}

/// Extracts all channel identifiers from a parsed listing page
///
/// One identifier per catalog row: the channel link's path without its leading
/// slash, either `@username` or `joinchat/<code>`. Rows without a title link are
/// skipped. Row order is preserved.
pub fn extract_identifiers(document: &Html) -> Vec<String> {
    let mut identifiers = Vec::new();

    let row_selector = match Selector::parse("#channels_table tbody tr") {
        Ok(s) => s,
        Err(_) => return identifiers,
    };
    let link_selector = match Selector::parse("a.kt-ch-title") {
        Ok(s) => s,
        Err(_) => return identifiers,
    };

    for row in document.select(&row_selector) {
        let Some(link) = row.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let path = href.trim_start_matches('/');
        if !path.is_empty() {
            identifiers.push(path.to_string());
        }
    }

    identifiers
}

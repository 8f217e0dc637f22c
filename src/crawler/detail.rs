//! Channel detail resolver
//!
//! Resolves one catalog identifier to a [`ChannelRecord`]. The structured API is
//! tried first; any failure there logs a warning and falls back to scraping the
//! channel's catalog page. Only when both paths fail does the error reach the
//! driver, which treats it as a per-item skip.

use crate::crawler::{AdminContact, ChannelRecord, DescriptionFragment};
use crate::{HarvestError, Result};
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

/// Attempts against the structured API before giving up on a rate limit
const API_ATTEMPTS: u32 = 3;

/// Keyword stems that mark a description line as naming an administrator or
/// contact. Lowercase; matched as substrings so inflected forms hit too.
const ADMIN_KEYWORDS: &[&str] = &[
    "админ",
    "менеджер",
    "контакт",
    "сотруднич",
    "связь",
    "admin",
    "manager",
    "contact",
];

fn handle_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@[A-Za-z][A-Za-z0-9_]{3,31}").unwrap())
}

/// Resolves channel identifiers to detail records
pub struct DetailResolver {
    client: Client,
    base_url: String,
    api_base_url: String,
    api_token: Option<String>,
}

impl DetailResolver {
    pub fn new(
        client: Client,
        base_url: &str,
        api_base_url: &str,
        api_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
        }
    }

    /// Resolves one identifier, API first, scrape as fallback
    pub async fn resolve(&self, identifier: &str) -> Result<ChannelRecord> {
        match self.resolve_via_api(identifier).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(
                    "API resolution failed for {} ({}); falling back to page scrape",
                    identifier,
                    e
                );
                self.resolve_via_scrape(identifier).await
            }
        }
    }

    /// Structured-API path: `/channels/get` with a bearer token
    async fn resolve_via_api(&self, identifier: &str) -> Result<ChannelRecord> {
        let channel_id = if identifier.starts_with("joinchat/") {
            identifier.to_string()
        } else {
            format!("@{}", identifier.trim_start_matches('@'))
        };

        let response = self
            .api_get("/channels/get", &[("channelId", channel_id.as_str())])
            .await?;

        record_from_api(&response)
    }

    /// Issues one API GET, retrying on HTTP 429 with a linear backoff
    async fn api_get(&self, path: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| HarvestError::Api("no API token configured".to_string()))?;

        let url = format!("{}{}", self.api_base_url, path);

        for attempt in 0..API_ATTEMPTS {
            let response = self
                .client
                .get(&url)
                .query(params)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| HarvestError::Http {
                    url: url.clone(),
                    source: e,
                })?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let delay = Duration::from_secs_f64(1.5 * f64::from(attempt + 1));
                tracing::debug!("API rate limited on {}, retrying in {:?}", path, delay);
                tokio::time::sleep(delay).await;
                continue;
            }

            let status = response.status();
            if !status.is_success() {
                return Err(HarvestError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            let envelope: serde_json::Value =
                response.json().await.map_err(|e| HarvestError::Http {
                    url: url.clone(),
                    source: e,
                })?;

            if envelope.get("status").and_then(|s| s.as_str()) != Some("ok") {
                return Err(HarvestError::Api(format!(
                    "unexpected API envelope from {}: {}",
                    path, envelope
                )));
            }

            return Ok(envelope
                .get("response")
                .cloned()
                .unwrap_or(serde_json::Value::Null));
        }

        Err(HarvestError::Api(format!(
            "rate limited after {} attempts to {}",
            API_ATTEMPTS, path
        )))
    }

    /// Scrape path: the channel's catalog page
    async fn resolve_via_scrape(&self, identifier: &str) -> Result<ChannelRecord> {
        let url = if identifier.starts_with("joinchat/") {
            format!("{}/{}", self.base_url, identifier)
        } else {
            format!("{}/@{}", self.base_url, identifier.trim_start_matches('@'))
        };

        let body = super::fetch_text(&self.client, &url).await?;
        parse_channel_document(&body, &url)
    }
}

/// Builds a record from the structured API's channel payload
pub(crate) fn record_from_api(response: &serde_json::Value) -> Result<ChannelRecord> {
    let title = response
        .get("title")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HarvestError::Api("channel payload has no title".to_string()))?
        .to_string();

    let username = response.get("username").and_then(|v| v.as_str());
    let link = response
        .get("link")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| username.map(|u| format!("https://t.me/{}", u.trim_start_matches('@'))))
        .ok_or_else(|| HarvestError::Api("channel payload has no link".to_string()))?;

    let handle = username
        .map(normalize_handle)
        .unwrap_or_else(|| handle_from_link(&link));

    let subscribers = ["participants_count", "participants", "subscribers_count"]
        .iter()
        .find_map(|key| response.get(*key).and_then(|v| v.as_i64()));

    let description: Vec<DescriptionFragment> = response
        .get("about")
        .and_then(|v| v.as_str())
        .map(|about| {
            about
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(DescriptionFragment::text)
                .collect()
        })
        .unwrap_or_default();

    let admins = extract_admins(&description);

    Ok(ChannelRecord {
        title,
        link,
        handle,
        subscribers,
        description,
        admins: (!admins.is_empty()).then_some(admins),
    })
}

/// Extracts a record from a scraped channel page
pub(crate) fn parse_channel_document(html: &str, url: &str) -> Result<ChannelRecord> {
    let document = Html::parse_document(html);

    let username_selector = match Selector::parse("a.kt-widget__username") {
        Ok(s) => s,
        Err(_) => return Err(extract_error(url, "invalid header selector".to_string())),
    };

    let anchor = document
        .select(&username_selector)
        .next()
        .ok_or_else(|| extract_error(url, "channel header not found".to_string()))?;

    let title = anchor.text().collect::<String>().trim().to_string();
    let link = anchor
        .value()
        .attr("href")
        .ok_or_else(|| extract_error(url, "channel header has no link".to_string()))?
        .to_string();
    let handle = handle_from_link(&link);

    let description = extract_description(&document);
    let subscribers = extract_subscribers(&document);
    let admins = extract_admins(&description);

    Ok(ChannelRecord {
        title,
        link,
        handle,
        subscribers,
        description,
        admins: (!admins.is_empty()).then_some(admins),
    })
}

fn extract_error(url: &str, message: String) -> HarvestError {
    HarvestError::Extract {
        url: url.to_string(),
        message,
    }
}

/// Walks the description block's direct children, keeping text runs and anchors
/// as ordered fragments; `<br>` separators are dropped
fn extract_description(document: &Html) -> Vec<DescriptionFragment> {
    let mut fragments = Vec::new();

    let desc_selector = match Selector::parse("div.kt-widget__desc.t_long") {
        Ok(s) => s,
        Err(_) => return fragments,
    };
    let Some(block) = document.select(&desc_selector).next() else {
        return fragments;
    };

    for node in block.children() {
        match node.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    fragments.push(DescriptionFragment::text(text));
                }
            }
            Node::Element(element) if element.name() == "a" => {
                let Some(element_ref) = ElementRef::wrap(node) else {
                    continue;
                };
                let text = element_ref.text().collect::<String>().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                match element_ref.value().attr("href") {
                    Some(href) => fragments.push(DescriptionFragment::linked(text, href)),
                    None => fragments.push(DescriptionFragment::text(text)),
                }
            }
            _ => {}
        }
    }

    fragments
}

fn extract_subscribers(document: &Html) -> Option<i64> {
    let selector = Selector::parse(r#"span.kt-number.kt-font-brand[data-num="participants"]"#).ok()?;
    let text = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())?;

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Normalizes a raw username into an `@handle`
fn normalize_handle(raw: &str) -> String {
    format!("@{}", raw.trim().trim_start_matches('@'))
}

/// Derives the `@handle` from a t.me-style link's last path segment
fn handle_from_link(link: &str) -> String {
    let last = link.trim_end_matches('/').rsplit('/').next().unwrap_or(link);
    normalize_handle(last)
}

/// Scans description fragments for administrator contacts
///
/// A line matches when it contains one of the admin/contact keyword stems;
/// matching lines contribute the fragment's anchored direct-messaging link (if
/// any) and every `@handle` token. Results are deduplicated by canonical link,
/// keeping first-appearance order.
pub fn extract_admins(fragments: &[DescriptionFragment]) -> Vec<AdminContact> {
    let mut contacts = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for fragment in fragments {
        for line in split_description_lines(&fragment.text) {
            if !is_admin_line(line) {
                continue;
            }

            if let Some(raw) = &fragment.link {
                if let Some(contact) = canonicalize_dm_link(raw, line) {
                    if seen.insert(contact.link.clone()) {
                        contacts.push(contact);
                    }
                }
            }

            for token in handle_regex().find_iter(line) {
                let handle = token.as_str();
                let link = format!("https://t.me/{}", handle.trim_start_matches('@'));
                if seen.insert(link.clone()) {
                    contacts.push(AdminContact {
                        label: handle.to_string(),
                        link,
                    });
                }
            }
        }
    }

    contacts
}

/// Splits fragment text on newlines and the bullet markers channel owners use
/// as visual separators
fn split_description_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '•', '●', '·'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn is_admin_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    ADMIN_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Normalizes a direct-messaging link to its canonical `https://t.me/...` form
///
/// Returns None for links to other hosts. Invite links (`joinchat/`, `+code`)
/// carry no handle, so the matching line itself becomes the label.
fn canonicalize_dm_link(raw: &str, line: &str) -> Option<AdminContact> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    if !matches!(host, "t.me" | "telegram.me" | "telegram.dog") {
        return None;
    }

    let first = url.path_segments()?.next()?.to_string();
    if first.is_empty() {
        return None;
    }

    if first == "joinchat" || first.starts_with('+') {
        let path = url.path().trim_start_matches('/');
        return Some(AdminContact {
            label: line.trim().to_string(),
            link: format!("https://t.me/{}", path),
        });
    }

    let handle = first.trim_start_matches('@');
    Some(AdminContact {
        label: format!("@{}", handle),
        link: format!("https://t.me/{}", handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL_PAGE: &str = r#"<html><body>
        <div class="kt-widget">
            <a class="kt-widget__username" href="https://t.me/rustlang_ru">Rust по-русски</a>
            <div class="kt-widget__desc t_long">
                Канал о языке Rust.<br>
                Админ: <a href="https://t.me/ferris_admin">@ferris_admin</a><br>
                Реклама: @ads_bot_someone
            </div>
            <span class="kt-number kt-font-brand" data-num="participants">12 345</span>
        </div>
    </body></html>"#;

    #[test]
    fn test_parse_channel_document() {
        let record = parse_channel_document(CHANNEL_PAGE, "https://telemetr.me/@rustlang_ru")
            .unwrap();

        assert_eq!(record.title, "Rust по-русски");
        assert_eq!(record.link, "https://t.me/rustlang_ru");
        assert_eq!(record.handle, "@rustlang_ru");
        assert_eq!(record.subscribers, Some(12_345));

        assert_eq!(record.description[0], DescriptionFragment::text("Канал о языке Rust."));
        assert_eq!(
            record.description[2],
            DescriptionFragment::linked("@ferris_admin", "https://t.me/ferris_admin")
        );
    }

    #[test]
    fn test_parse_channel_document_missing_header() {
        let result = parse_channel_document("<html><body></body></html>", "https://x/@y");
        assert!(matches!(result, Err(HarvestError::Extract { .. })));
    }

    #[test]
    fn test_missing_subscriber_counter_is_none() {
        let html = r#"<html><body>
            <a class="kt-widget__username" href="https://t.me/quiet">Quiet</a>
        </body></html>"#;
        let record = parse_channel_document(html, "https://telemetr.me/@quiet").unwrap();
        assert_eq!(record.subscribers, None);
    }

    #[test]
    fn test_record_from_api() {
        let payload = serde_json::json!({
            "title": "Rust по-русски",
            "username": "rustlang_ru",
            "participants_count": 9000,
            "about": "Канал о Rust\nМенеджер: @ferris_admin"
        });

        let record = record_from_api(&payload).unwrap();
        assert_eq!(record.handle, "@rustlang_ru");
        assert_eq!(record.link, "https://t.me/rustlang_ru");
        assert_eq!(record.subscribers, Some(9000));

        let admins = record.admins.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].label, "@ferris_admin");
        assert_eq!(admins[0].link, "https://t.me/ferris_admin");
    }

    #[test]
    fn test_record_from_api_rejects_empty_payload() {
        assert!(record_from_api(&serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_extract_admins_keyword_gating() {
        let fragments = vec![
            DescriptionFragment::text("Просто описание с @someone_else"),
            DescriptionFragment::text("Админ: @real_owner"),
        ];
        let admins = extract_admins(&fragments);
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].label, "@real_owner");
    }

    #[test]
    fn test_extract_admins_from_anchored_link() {
        let fragments = vec![DescriptionFragment::linked(
            "по рекламе (менеджер)",
            "https://t.me/sales_person",
        )];
        let admins = extract_admins(&fragments);
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].label, "@sales_person");
        assert_eq!(admins[0].link, "https://t.me/sales_person");
    }

    #[test]
    fn test_extract_admins_dedups_by_link() {
        let fragments = vec![
            DescriptionFragment::linked("Админ @twice_listed", "https://t.me/twice_listed"),
            DescriptionFragment::text("contact: @twice_listed"),
        ];
        let admins = extract_admins(&fragments);
        assert_eq!(admins.len(), 1);
    }

    #[test]
    fn test_extract_admins_bullet_separated_lines() {
        let fragments = vec![DescriptionFragment::text(
            "Новости каждый день • Админ: @bullet_admin • Прислать новость: @tips_bot",
        )];
        let admins = extract_admins(&fragments);
        // Only the admin bullet matches; the news bullets carry no keyword
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].label, "@bullet_admin");
    }

    #[test]
    fn test_extract_admins_ignores_foreign_hosts() {
        let fragments = vec![DescriptionFragment::linked(
            "Админ в инстаграме",
            "https://instagram.com/someone",
        )];
        assert!(extract_admins(&fragments).is_empty());
    }

    #[test]
    fn test_canonicalize_invite_link() {
        let contact = canonicalize_dm_link(
            "https://t.me/joinchat/AbCdEf123",
            "связь с админом тут",
        )
        .unwrap();
        assert_eq!(contact.link, "https://t.me/joinchat/AbCdEf123");
        assert_eq!(contact.label, "связь с админом тут");
    }

    #[test]
    fn test_handle_from_link() {
        assert_eq!(handle_from_link("https://t.me/some_channel"), "@some_channel");
        assert_eq!(handle_from_link("https://t.me/some_channel/"), "@some_channel");
        assert_eq!(handle_from_link("@already"), "@already");
    }
}

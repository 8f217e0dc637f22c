//! Profile-page quota monitor
//!
//! The site meters account usage on the profile page as a series of limit
//! blocks, each a descriptive label next to a `current / maximum` counter. One
//! designated limit gates the crawl: once its remaining count reaches zero the
//! catalog stops serving channel detail, so the driver must stop before fetching
//! further pages. Every other limit is advisory.

use crate::{HarvestError, Result};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::OnceLock;

/// Severity of a usage limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Exhaustion must stop the crawl before the next page fetch
    Gate,
    /// Exhaustion is logged and does not block
    Warn,
}

/// One usage limit scraped from the profile page
///
/// Never persisted; fetched fresh before every decision that depends on it. The
/// counter may already be stale by the time it is acted on - that race is
/// accepted as best-effort throttling.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaLimit {
    pub name: String,
    pub description: String,
    pub current: i64,
    pub maximum: i64,
    pub severity: Severity,
}

impl QuotaLimit {
    pub fn is_exhausted(&self) -> bool {
        self.current <= 0
    }
}

/// Returns the first exhausted gate-severity limit, if any
pub fn exhausted_gate(limits: &[QuotaLimit]) -> Option<&QuotaLimit> {
    limits
        .iter()
        .find(|l| l.severity == Severity::Gate && l.is_exhausted())
}

fn counter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d[\d\s\u{a0}]*)\s*/\s*(\d[\d\s\u{a0}]*)").unwrap())
}

fn parse_count(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Scrapes the account's usage limits from the profile page
pub struct QuotaMonitor {
    client: Client,
    profile_url: String,
    gate_name_lower: String,
}

impl QuotaMonitor {
    pub fn new(client: Client, base_url: &str, gate_limit_name: &str) -> Self {
        Self {
            client,
            profile_url: format!("{}/profile", base_url.trim_end_matches('/')),
            gate_name_lower: gate_limit_name.to_lowercase(),
        }
    }

    /// Fetches and parses the current limit list
    ///
    /// Transport failures propagate; limit blocks that don't match the expected
    /// structure are skipped silently, so a partial list is possible.
    pub async fn check(&self) -> Result<Vec<QuotaLimit>> {
        let body = super::fetch_text(&self.client, &self.profile_url).await?;
        Ok(self.parse_limits(&body))
    }

    /// Extracts limit blocks from the profile document
    pub fn parse_limits(&self, body: &str) -> Vec<QuotaLimit> {
        let document = Html::parse_document(body);
        let mut limits = Vec::new();

        let block_selector = match Selector::parse("div.limit-item") {
            Ok(s) => s,
            Err(_) => return limits,
        };
        let name_selector = match Selector::parse(".limit-name") {
            Ok(s) => s,
            Err(_) => return limits,
        };
        let value_selector = match Selector::parse(".limit-value") {
            Ok(s) => s,
            Err(_) => return limits,
        };
        let note_selector = Selector::parse(".limit-note").ok();

        for block in document.select(&block_selector) {
            let name = match block.select(&name_selector).next() {
                Some(el) => el.text().collect::<String>().trim().to_string(),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }

            let counter_text = match block.select(&value_selector).next() {
                Some(el) => el.text().collect::<String>(),
                None => continue,
            };

            let Some(caps) = counter_regex().captures(&counter_text) else {
                tracing::debug!("Unparseable limit counter for '{}': {}", name, counter_text);
                continue;
            };
            let (Some(current), Some(maximum)) =
                (parse_count(&caps[1]), parse_count(&caps[2]))
            else {
                continue;
            };

            let description = note_selector
                .as_ref()
                .and_then(|sel| block.select(sel).next())
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| name.clone());

            let severity = if name.to_lowercase().contains(&self.gate_name_lower) {
                Severity::Gate
            } else {
                Severity::Warn
            };

            limits.push(QuotaLimit {
                name,
                description,
                current,
                maximum,
                severity,
            });
        }

        limits
    }

    /// Convenience wrapper: checks the limits and fails when the gate limit is
    /// already spent, used for the driver's pre-flight
    pub async fn ensure_gate_open(&self) -> Result<Vec<QuotaLimit>> {
        let limits = self.check().await?;

        for limit in limits.iter().filter(|l| l.is_exhausted()) {
            match limit.severity {
                Severity::Gate => {
                    return Err(HarvestError::QuotaExhausted {
                        name: limit.name.clone(),
                        description: limit.description.clone(),
                    })
                }
                Severity::Warn => {
                    tracing::warn!(
                        "Limit '{}' exhausted ({}/{}); continuing",
                        limit.name,
                        limit.current,
                        limit.maximum
                    );
                }
            }
        }

        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> QuotaMonitor {
        QuotaMonitor::new(
            Client::new(),
            "https://telemetr.me",
            "Просмотры каналов",
        )
    }

    fn profile_html(blocks: &[(&str, &str)]) -> String {
        let body: String = blocks
            .iter()
            .map(|(name, value)| {
                format!(
                    r#"<div class="limit-item">
                        <span class="limit-name">{}</span>
                        <span class="limit-value">{}</span>
                    </div>"#,
                    name, value
                )
            })
            .collect();
        format!("<html><body><div class=\"profile-limits\">{}</div></body></html>", body)
    }

    #[test]
    fn test_parse_limits_basic() {
        let html = profile_html(&[
            ("Просмотры каналов", "12 / 500"),
            ("Выгрузка в Excel", "3 / 10"),
        ]);

        let limits = monitor().parse_limits(&html);
        assert_eq!(limits.len(), 2);

        assert_eq!(limits[0].name, "Просмотры каналов");
        assert_eq!(limits[0].current, 12);
        assert_eq!(limits[0].maximum, 500);
        assert_eq!(limits[0].severity, Severity::Gate);

        assert_eq!(limits[1].severity, Severity::Warn);
    }

    #[test]
    fn test_parse_limits_with_spaced_thousands() {
        let html = profile_html(&[("Просмотры каналов", "1 250 / 5 000")]);
        let limits = monitor().parse_limits(&html);
        assert_eq!(limits[0].current, 1250);
        assert_eq!(limits[0].maximum, 5000);
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let html = profile_html(&[
            ("Просмотры каналов", "no counter here"),
            ("Выгрузка в Excel", "3 / 10"),
        ]);
        let limits = monitor().parse_limits(&html);
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0].name, "Выгрузка в Excel");
    }

    #[test]
    fn test_exhausted_gate_detection() {
        let html = profile_html(&[
            ("Выгрузка в Excel", "0 / 10"),
            ("Просмотры каналов", "0 / 500"),
        ]);
        let limits = monitor().parse_limits(&html);

        // The warn-severity limit being spent does not surface as a gate
        let gate = exhausted_gate(&limits).unwrap();
        assert_eq!(gate.name, "Просмотры каналов");
    }

    #[test]
    fn test_no_gate_when_budget_remains() {
        let html = profile_html(&[("Просмотры каналов", "1 / 500")]);
        let limits = monitor().parse_limits(&html);
        assert!(exhausted_gate(&limits).is_none());
    }

    #[test]
    fn test_empty_profile_yields_no_limits() {
        let limits = monitor().parse_limits("<html><body></body></html>");
        assert!(limits.is_empty());
    }
}

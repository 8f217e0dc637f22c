//! Crawl driver - the pagination-and-resume crawl loop
//!
//! Orchestrates pages × items: consults the quota monitor before each page, the
//! processed-channel ledger before each item, resolves details through the
//! primary/fallback resolver, honors the cooperative stop signal, and keeps
//! partial progress durable. Everything else in the crate is plumbing around
//! this loop.

use crate::config::{AppConfig, FilterStore};
use crate::crawler::detail::DetailResolver;
use crate::crawler::listing::{self, FULL_PAGE_SIZE};
use crate::crawler::quota::{exhausted_gate, QuotaMonitor, Severity};
use crate::crawler::{build_http_client, ChannelRecord};
use crate::ledger::{Ledger, ProcessedSet};
use crate::output::ResultSink;
use crate::state::RunState;
use crate::{HarvestError, Result};
use std::sync::Arc;

/// How a crawl loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The page range or the catalog itself was exhausted
    Completed,
    /// The operator's stop request was honored
    StoppedByOperator,
    /// A gate-severity limit ran out mid-run
    QuotaExhausted { name: String },
}

/// Result of a finished run, successful or cut short
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<ChannelRecord>,
    pub outcome: RunOutcome,
    pub pages_visited: u32,
    /// Identifiers seen on listing pages during this run
    pub listed: usize,
    /// Identifiers skipped because the ledger already had them
    pub duplicates_skipped: usize,
}

impl RunReport {
    /// The operator-facing summary for the status endpoint
    pub fn status_message(&self) -> String {
        match &self.outcome {
            RunOutcome::Completed => format!(
                "completed: {} channels from {} pages ({} already processed)",
                self.records.len(),
                self.pages_visited,
                self.duplicates_skipped
            ),
            RunOutcome::StoppedByOperator => format!(
                "stopped by operator: {} channels collected",
                self.records.len()
            ),
            RunOutcome::QuotaExhausted { name } => format!(
                "stopped: quota exhausted: {} ({} channels collected)",
                name,
                self.records.len()
            ),
        }
    }
}

/// Counters the page loop accumulates for final classification
#[derive(Debug, Default)]
struct LoopStats {
    pages_visited: u32,
    listed: usize,
    duplicates_skipped: usize,
    attempted: usize,
}

/// The crawl driver
///
/// Receives its shared state explicitly at construction; nothing is discovered
/// through globals.
pub struct Driver {
    config: Arc<AppConfig>,
    state: Arc<RunState>,
    filter_store: FilterStore,
    ledger: Ledger,
    sink: ResultSink,
    quota: QuotaMonitor,
    resolver: DetailResolver,
    client: reqwest::Client,
}

impl Driver {
    pub fn new(config: Arc<AppConfig>, state: Arc<RunState>) -> Result<Self> {
        let client = build_http_client(&config.http, &config.site.base_url)?;

        let filter_store = FilterStore::new(&config.filters_path);
        let ledger = Ledger::new(&config.output.ledger_path);
        let sink = ResultSink::new(&config.output.data_dir);
        let quota = QuotaMonitor::new(
            client.clone(),
            &config.site.base_url,
            &config.site.gate_limit_name,
        );
        let resolver = DetailResolver::new(
            client.clone(),
            &config.site.base_url,
            &config.site.api_base_url,
            config.site.api_token.clone(),
        );

        Ok(Self {
            config,
            state,
            filter_store,
            ledger,
            sink,
            quota,
            resolver,
            client,
        })
    }

    /// Runs one crawl to completion or to a stopping condition
    ///
    /// Fails only when no record could be produced at all and no stop/quota
    /// condition explains the emptiness. Whatever was accumulated before a
    /// failure is still flushed to the ledger and the result sink.
    pub async fn run(&self) -> Result<RunReport> {
        self.state.stop.clear();

        // Reload-on-read: operator edits between runs take effect here
        let filters = self.filter_store.load()?;
        tracing::info!(
            "Starting crawl: pages {}..{}",
            filters.start_page,
            filters
                .end_page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "∞".to_string())
        );

        let mut processed = self.ledger.load();
        let loaded_count = processed.len();
        tracing::info!("Ledger loaded: {} previously processed channels", loaded_count);

        // Pre-flight: a spent gate limit aborts before any page is fetched
        self.quota.ensure_gate_open().await?;

        self.state.set_page_range(filters.start_page, filters.end_page);

        let mut records = Vec::new();
        let mut stats = LoopStats::default();

        let loop_result = self
            .crawl_pages(&filters, &mut processed, &mut records, &mut stats)
            .await;

        // Durable-flush step: runs on every exit path, including transport
        // failures. Persistence problems are logged, never escalated.
        if let Err(e) = self.ledger.save(&processed) {
            tracing::warn!("Ledger flush failed: {}", e);
        }
        if !records.is_empty() {
            match self.sink.write_all(&records) {
                Ok(()) => tracing::info!("Persisted {} channel records", records.len()),
                Err(e) => tracing::warn!("Result sink write failed: {}", e),
            }
        }
        self.state.stop.clear();

        let outcome = loop_result?;

        let report = RunReport {
            records,
            outcome,
            pages_visited: stats.pages_visited,
            listed: stats.listed,
            duplicates_skipped: stats.duplicates_skipped,
        };

        if report.records.is_empty() {
            if let Some(e) = classify_empty_run(&report.outcome, &stats) {
                return Err(e);
            }
        }

        tracing::info!("{}", report.status_message());
        Ok(report)
    }

    /// The page × item loop
    ///
    /// Returns how the loop ended; transport errors from listing or quota
    /// fetches propagate and are fatal to the run (the caller still flushes).
    async fn crawl_pages(
        &self,
        filters: &crate::config::FilterSet,
        processed: &mut ProcessedSet,
        records: &mut Vec<ChannelRecord>,
        stats: &mut LoopStats,
    ) -> Result<RunOutcome> {
        let mut page = filters.start_page;

        loop {
            if let Some(end) = filters.end_page {
                if page > end {
                    return Ok(RunOutcome::Completed);
                }
            }

            if self.state.stop.is_requested() {
                tracing::info!("Stop requested before page {}", page);
                return Ok(RunOutcome::StoppedByOperator);
            }

            // Fresh quota read before every page; severity comes from this
            // fetch only, never from an earlier loop iteration
            let limits = self.quota.check().await?;
            for limit in limits.iter().filter(|l| l.is_exhausted()) {
                if limit.severity == Severity::Warn {
                    tracing::warn!("Limit '{}' exhausted; continuing", limit.name);
                }
            }
            if let Some(gate) = exhausted_gate(&limits) {
                tracing::warn!(
                    "Gate limit '{}' exhausted before page {}; stopping with partial results",
                    gate.name,
                    page
                );
                return Ok(RunOutcome::QuotaExhausted {
                    name: gate.name.clone(),
                });
            }

            self.state.begin_page(page, 0);
            let identifiers = listing::fetch_page(
                &self.client,
                &self.config.site.base_url,
                filters,
                page,
            )
            .await?;
            stats.pages_visited += 1;

            if identifiers.is_empty() {
                tracing::info!("Page {} is empty; end of catalog", page);
                return Ok(RunOutcome::Completed);
            }

            let is_last_page = identifiers.len() < FULL_PAGE_SIZE;
            stats.listed += identifiers.len();
            self.state.begin_page(page, identifiers.len() as u32);
            tracing::info!("Page {}: {} channels listed", page, identifiers.len());

            let mut page_duplicates = 0usize;
            for (index, identifier) in identifiers.iter().enumerate() {
                if processed.contains(identifier) {
                    page_duplicates += 1;
                    continue;
                }

                if self.state.stop.is_requested() {
                    tracing::info!("Stop requested mid-page at item {}/{}", index + 1, identifiers.len());
                    stats.duplicates_skipped += page_duplicates;
                    return Ok(RunOutcome::StoppedByOperator);
                }

                self.state.begin_item(index as u32 + 1);
                stats.attempted += 1;

                match self.resolver.resolve(identifier).await {
                    Ok(record) => {
                        tracing::debug!("Resolved {} ({})", identifier, record.title);
                        records.push(record);
                        processed.insert(identifier.clone());
                    }
                    Err(e) => {
                        // A single channel failing never aborts the page or run
                        tracing::warn!("Skipping channel {}: {}", identifier, e);
                    }
                }
            }

            stats.duplicates_skipped += page_duplicates;
            if page_duplicates > 0 {
                tracing::debug!(
                    "Page {}: {} already-processed channels skipped",
                    page,
                    page_duplicates
                );
            }

            // Keep partial progress durable between pages
            if let Err(e) = self.ledger.save(processed) {
                tracing::warn!("Incremental ledger flush failed: {}", e);
            }

            if is_last_page {
                tracing::info!(
                    "Page {} held {} channels (< {}); treating as the last page",
                    page,
                    identifiers.len(),
                    FULL_PAGE_SIZE
                );
                return Ok(RunOutcome::Completed);
            }

            page += 1;
        }
    }
}

/// Distinguishes the empty-batch conditions so operators can tell quota
/// exhaustion from genuinely empty filters
fn classify_empty_run(outcome: &RunOutcome, stats: &LoopStats) -> Option<HarvestError> {
    // Stop and quota conditions explain an empty batch; they are not failures
    if !matches!(outcome, RunOutcome::Completed) {
        return None;
    }

    if stats.listed == 0 {
        return Some(HarvestError::NoMatches);
    }

    if stats.attempted == 0 {
        return Some(HarvestError::NothingNew {
            skipped: stats.duplicates_skipped,
        });
    }

    Some(HarvestError::AllFailed {
        attempted: stats.attempted,
    })
}

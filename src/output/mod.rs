//! Result sink - persists the accumulated record batch
//!
//! Every completed or partial run replaces both artifacts in the data
//! directory: a JSON array (the row-oriented structured form) and a CSV file
//! (the spreadsheet form). The control plane serves both for download.

use crate::crawler::ChannelRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing output artifacts
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// The two downloadable artifact kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Csv,
    Json,
}

impl OutputKind {
    /// Parses an operator-supplied kind string
    ///
    /// `excel` stays accepted as an alias for the spreadsheet artifact; the web
    /// form has always called it that.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "csv" | "excel" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Csv => "channels.csv",
            Self::Json => "channels.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    pub const ALL: [OutputKind; 2] = [OutputKind::Csv, OutputKind::Json];
}

/// Writes record batches to the data directory
pub struct ResultSink {
    data_dir: PathBuf,
}

impl ResultSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn artifact_path(&self, kind: OutputKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Writes the full batch to both artifacts, replacing previous contents
    pub fn write_all(&self, records: &[ChannelRecord]) -> OutputResult<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        self.write_json(records)?;
        self.write_csv(records)?;
        Ok(())
    }

    fn write_json(&self, records: &[ChannelRecord]) -> OutputResult<()> {
        let path = self.artifact_path(OutputKind::Json);
        let body = serde_json::to_vec_pretty(records)?;
        std::fs::write(&path, body)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }

    fn write_csv(&self, records: &[ChannelRecord]) -> OutputResult<()> {
        let path = self.artifact_path(OutputKind::Csv);
        let mut writer = csv::Writer::from_path(&path)?;

        writer.write_record(["title", "link", "handle", "subscribers", "description", "admins"])?;

        for record in records {
            let subscribers = record
                .subscribers
                .map(|n| n.to_string())
                .unwrap_or_default();
            let description = flatten_description(record);
            let admins = flatten_admins(record);
            writer.write_record([
                record.title.as_str(),
                record.link.as_str(),
                record.handle.as_str(),
                subscribers.as_str(),
                description.as_str(),
                admins.as_str(),
            ])?;
        }

        writer.flush()?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// One spreadsheet cell per channel: fragments joined, anchored links inlined
fn flatten_description(record: &ChannelRecord) -> String {
    record
        .description
        .iter()
        .map(|fragment| match &fragment.link {
            Some(link) => format!("{} ({})", fragment.text, link),
            None => fragment.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn flatten_admins(record: &ChannelRecord) -> String {
    record
        .admins
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|admin| format!("{} <{}>", admin.label, admin.link))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{AdminContact, DescriptionFragment};
    use tempfile::TempDir;

    fn sample_record() -> ChannelRecord {
        ChannelRecord {
            title: "Rust по-русски".to_string(),
            link: "https://t.me/rustlang_ru".to_string(),
            handle: "@rustlang_ru".to_string(),
            subscribers: Some(12_345),
            description: vec![
                DescriptionFragment::text("Канал о Rust"),
                DescriptionFragment::linked("чат", "https://t.me/rustlang_chat"),
            ],
            admins: Some(vec![AdminContact {
                label: "@ferris_admin".to_string(),
                link: "https://t.me/ferris_admin".to_string(),
            }]),
        }
    }

    #[test]
    fn test_kind_parsing_with_alias() {
        assert_eq!(OutputKind::parse("csv"), Some(OutputKind::Csv));
        assert_eq!(OutputKind::parse("excel"), Some(OutputKind::Csv));
        assert_eq!(OutputKind::parse("json"), Some(OutputKind::Json));
        assert_eq!(OutputKind::parse("pdf"), None);
    }

    #[test]
    fn test_write_all_produces_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path());

        sink.write_all(&[sample_record()]).unwrap();

        let json = std::fs::read_to_string(sink.artifact_path(OutputKind::Json)).unwrap();
        let parsed: Vec<ChannelRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].handle, "@rustlang_ru");

        let csv_body = std::fs::read_to_string(sink.artifact_path(OutputKind::Csv)).unwrap();
        assert!(csv_body.starts_with("title,link,handle,subscribers,description,admins"));
        assert!(csv_body.contains("@rustlang_ru"));
        assert!(csv_body.contains("12345"));
    }

    #[test]
    fn test_rewrite_replaces_previous_batch() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path());

        sink.write_all(&[sample_record()]).unwrap();
        sink.write_all(&[]).unwrap();

        let json = std::fs::read_to_string(sink.artifact_path(OutputKind::Json)).unwrap();
        let parsed: Vec<ChannelRecord> = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_unknown_subscribers_is_empty_cell() {
        let mut record = sample_record();
        record.subscribers = None;

        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path());
        sink.write_all(&[record]).unwrap();

        let csv_body = std::fs::read_to_string(sink.artifact_path(OutputKind::Csv)).unwrap();
        let data_line = csv_body.lines().nth(1).unwrap();
        assert!(data_line.contains(",@rustlang_ru,,"));
    }

    #[test]
    fn test_flatten_description_inlines_links() {
        let record = sample_record();
        assert_eq!(
            flatten_description(&record),
            "Канал о Rust; чат (https://t.me/rustlang_chat)"
        );
        assert_eq!(
            flatten_admins(&record),
            "@ferris_admin <https://t.me/ferris_admin>"
        );
    }
}

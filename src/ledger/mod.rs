//! Processed-channel ledger
//!
//! A persisted set of channel identifiers that have already been resolved in any
//! prior run. The driver loads it once at run start, grows it in memory as items
//! succeed, and flushes it back at run end and on failure paths. Flushing is
//! best-effort: the caller logs and swallows ledger write failures, and a
//! missing or corrupt database means "start fresh", never a fatal error.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// In-memory view of the processed-identifier set
///
/// Grows monotonically during a run; insertion order is irrelevant, membership is
/// everything.
#[derive(Debug, Default, Clone)]
pub struct ProcessedSet {
    items: HashSet<String>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.items.contains(identifier)
    }

    /// Returns true if the identifier was newly added
    pub fn insert(&mut self, identifier: impl Into<String>) -> bool {
        self.items.insert(identifier.into())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ProcessedSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// SQLite-backed ledger store
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> LedgerResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS processed (
                identifier TEXT PRIMARY KEY,
                first_seen TEXT NOT NULL
            )",
            [],
        )?;

        Ok(conn)
    }

    /// Loads the persisted set
    ///
    /// A missing or unreadable database yields an empty set: resuming with no
    /// dedup history is always safe, losing a run to a corrupt file is not.
    pub fn load(&self) -> ProcessedSet {
        match self.try_load() {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(
                    "Could not read ledger at {} ({}); starting fresh",
                    self.path.display(),
                    e
                );
                ProcessedSet::new()
            }
        }
    }

    fn try_load(&self) -> LedgerResult<ProcessedSet> {
        if !self.path.exists() {
            return Ok(ProcessedSet::new());
        }

        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT identifier FROM processed")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut set = ProcessedSet::new();
        for row in rows {
            set.insert(row?);
        }

        Ok(set)
    }

    /// Persists the set, inserting identifiers not yet on disk
    ///
    /// Existing rows keep their original first_seen timestamp; the ledger only
    /// ever grows.
    pub fn save(&self, set: &ProcessedSet) -> LedgerResult<()> {
        let mut conn = self.open()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO processed (identifier, first_seen) VALUES (?1, ?2)",
            )?;
            for identifier in set.iter() {
                stmt.execute(params![identifier, now])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Ledger flushed: {} identifiers", set.len());
        Ok(())
    }
}

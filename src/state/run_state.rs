use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Cooperative cancellation flag
///
/// The control plane sets it, the driver polls it at page and item boundaries and
/// clears it at the start and unconditionally at the end of every run. That
/// single-writer-per-direction discipline is what keeps the flag race-free.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Live status of the crawl driver
///
/// Progress fields are plain atomics: status readers tolerate slightly stale
/// values, and only the driver task writes while a run is active.
#[derive(Debug)]
pub struct RunState {
    running: AtomicBool,
    message: Mutex<Option<String>>,

    current_page: AtomicU32,
    start_page: AtomicU32,
    /// 0 means "unbounded"
    end_page: AtomicU32,
    /// 1-based index of the item currently being resolved, 0 between pages
    item_index: AtomicU32,
    items_on_page: AtomicU32,

    pub stop: StopSignal,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            message: Mutex::new(None),
            current_page: AtomicU32::new(0),
            start_page: AtomicU32::new(0),
            end_page: AtomicU32::new(0),
            item_index: AtomicU32::new(0),
            items_on_page: AtomicU32::new(0),
            stop: StopSignal::new(),
        }
    }

    /// Attempts to transition from idle to running
    ///
    /// Returns false if a run is already active (the caller should report a
    /// conflict). On success the progress snapshot, message, and stop signal are
    /// reset for the new run.
    pub fn try_begin_run(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.set_message(None);
        self.current_page.store(0, Ordering::Relaxed);
        self.start_page.store(0, Ordering::Relaxed);
        self.end_page.store(0, Ordering::Relaxed);
        self.item_index.store(0, Ordering::Relaxed);
        self.items_on_page.store(0, Ordering::Relaxed);
        self.stop.clear();

        true
    }

    /// Marks the run finished, recording the most specific condition for status
    /// queries, and clears the stop signal so the next run starts unimpeded.
    pub fn finish_run(&self, message: Option<String>) {
        self.set_message(message);
        self.stop.clear();
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_message(&self, message: Option<String>) {
        // A poisoned mutex would mean a panic mid-update of a plain Option; the
        // stored value is still usable.
        let mut slot = match self.message.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = message;
    }

    pub fn message(&self) -> Option<String> {
        let slot = match self.message.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }

    pub fn set_page_range(&self, start: u32, end: Option<u32>) {
        self.start_page.store(start, Ordering::Relaxed);
        self.end_page.store(end.unwrap_or(0), Ordering::Relaxed);
    }

    pub fn begin_page(&self, page: u32, items_on_page: u32) {
        self.current_page.store(page, Ordering::Relaxed);
        self.items_on_page.store(items_on_page, Ordering::Relaxed);
        self.item_index.store(0, Ordering::Relaxed);
    }

    pub fn begin_item(&self, index: u32) {
        self.item_index.store(index, Ordering::Relaxed);
    }

    /// Point-in-time view for the status endpoint; never blocks on the driver
    pub fn snapshot(&self) -> StatusSnapshot {
        let end_page = self.end_page.load(Ordering::Relaxed);
        StatusSnapshot {
            running: self.is_running(),
            message: self.message(),
            progress: ProgressSnapshot {
                current_page: self.current_page.load(Ordering::Relaxed),
                start_page: self.start_page.load(Ordering::Relaxed),
                end_page: (end_page != 0).then_some(end_page),
                item_index: self.item_index.load(Ordering::Relaxed),
                items_on_page: self.items_on_page.load(Ordering::Relaxed),
            },
        }
    }
}

/// Progress fields reported by the status endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    pub current_page: u32,
    pub start_page: u32,
    pub end_page: Option<u32>,
    pub item_index: u32,
    pub items_on_page: u32,
}

/// Full status payload
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub message: Option<String>,
    pub progress: ProgressSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_run_is_exclusive() {
        let state = RunState::new();
        assert!(state.try_begin_run());
        assert!(!state.try_begin_run());

        state.finish_run(None);
        assert!(state.try_begin_run());
    }

    #[test]
    fn test_begin_run_resets_previous_state() {
        let state = RunState::new();
        assert!(state.try_begin_run());
        state.set_page_range(1, Some(9));
        state.begin_page(4, 30);
        state.begin_item(12);
        state.finish_run(Some("stopped by operator".to_string()));

        assert!(state.try_begin_run());
        let snapshot = state.snapshot();
        assert!(snapshot.running);
        assert_eq!(snapshot.message, None);
        assert_eq!(snapshot.progress.current_page, 0);
        assert_eq!(snapshot.progress.end_page, None);
    }

    #[test]
    fn test_finish_clears_stop_signal() {
        let state = RunState::new();
        assert!(state.try_begin_run());
        state.stop.request();
        assert!(state.stop.is_requested());

        state.finish_run(Some("stopped by operator".to_string()));
        assert!(!state.stop.is_requested());
        assert_eq!(state.message().as_deref(), Some("stopped by operator"));
    }

    #[test]
    fn test_snapshot_reflects_progress() {
        let state = RunState::new();
        assert!(state.try_begin_run());
        state.set_page_range(3, None);
        state.begin_page(3, 30);
        state.begin_item(7);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.progress.start_page, 3);
        assert_eq!(snapshot.progress.end_page, None);
        assert_eq!(snapshot.progress.current_page, 3);
        assert_eq!(snapshot.progress.item_index, 7);
        assert_eq!(snapshot.progress.items_on_page, 30);
    }
}

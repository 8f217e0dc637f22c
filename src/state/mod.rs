//! Shared run state for the crawl driver and the control plane
//!
//! One `RunState` (and its embedded `StopSignal`) exists per process, created at
//! startup and handed by reference to both the driver task and the HTTP handlers.

mod run_state;

pub use run_state::{ProgressSnapshot, RunState, StatusSnapshot, StopSignal};

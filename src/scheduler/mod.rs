//! Debounced, single-in-flight pass scheduling.

pub mod runner;
pub mod state;

pub use runner::{AnalysisScheduler, SchedulerHandle, SchedulerStatus, DEFAULT_DEBOUNCE};
pub use state::{Action, SchedulerCore, SchedulerState, SchedulerStats};

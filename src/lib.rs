//! ContrastWatch - continuous accessibility compliance monitoring.
//!
//! Evaluates foreground/background color pairs of a UI surface against WCAG
//! contrast thresholds, classifies findings, schedules debounced analysis
//! passes as the surface changes, keeps a bounded compliance history with
//! trend analysis, and recommends accessibility profiles.

pub mod analysis;
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod monitor;
pub mod profiles;
pub mod provider;
pub mod report;
pub mod scheduler;
pub mod storage;

pub use monitor::{ComplianceMonitor, MonitorConfig};
pub use scheduler::{AnalysisScheduler, SchedulerHandle};

//! Compliance history and trend analysis.

pub mod history;
pub mod trend;

pub use history::{ComplianceLedger, DEFAULT_HISTORY_CAP};
pub use trend::{
    TrendAnalysis, TrendChange, TrendConfig, TrendDirection, TrendEngine, TrendPoint,
};

//! Report rendering and outbound events.

pub mod generator;
pub mod sink;

pub use generator::{generate_json_report, generate_markdown_report, write_report};
pub use sink::{
    ChannelSink, MonitorEvent, PassEvent, RecommendationEvent, ReportSink, TracingSink,
};

use crate::ledger::TrendAnalysis;
use crate::models::{PassReport, RunSummary};
use crate::profiles::Recommendations;
use serde::{Deserialize, Serialize};

/// Everything a rendered report shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDocument {
    pub report: PassReport,
    /// Oldest first.
    pub history: Vec<RunSummary>,
    pub trend: TrendAnalysis,
    pub recommendations: Recommendations,
}

//! Bounded, append-only history of run summaries.

use crate::models::{PassReport, RunSummary};
use std::collections::VecDeque;
use tracing::debug;

pub const DEFAULT_HISTORY_CAP: usize = 50;

/// Finalizes passes into run summaries and keeps the most recent ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceLedger {
    cap: usize,
    history: VecDeque<RunSummary>,
    latest: Option<PassReport>,
}

impl Default for ComplianceLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl ComplianceLedger {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            history: VecDeque::new(),
            latest: None,
        }
    }

    /// Rebuild from persisted summaries, keeping only the newest `cap`.
    pub fn with_history(cap: usize, summaries: Vec<RunSummary>) -> Self {
        let mut ledger = Self::new(cap);
        for summary in summaries {
            ledger.append(summary);
        }
        ledger
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Record a completed pass. Failed passes are kept as the latest report
    /// but never enter the history.
    pub fn record(&mut self, report: PassReport) -> Option<RunSummary> {
        let summary = if report.failed {
            None
        } else {
            let summary = RunSummary::from_report(&report);
            self.append(summary.clone());
            Some(summary)
        };
        self.latest = Some(report);
        summary
    }

    /// Append a summary, evicting the oldest entries beyond the cap.
    pub fn append(&mut self, summary: RunSummary) {
        self.history.push_back(summary);
        while self.history.len() > self.cap {
            if let Some(evicted) = self.history.pop_front() {
                debug!("Evicted run summary from {}", evicted.timestamp);
            }
        }
    }

    pub fn latest_report(&self) -> Option<&PassReport> {
        self.latest.as_ref()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Oldest first.
    pub fn summaries(&self) -> impl Iterator<Item = &RunSummary> {
        self.history.iter()
    }

    /// The `limit` most recent summaries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<RunSummary> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<RunSummary> {
        self.history.iter().cloned().collect()
    }
}

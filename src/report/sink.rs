//! The narrow outbound interface for presentation layers.

use crate::ledger::{TrendChange, TrendDirection};
use crate::models::{Advice, Issue, PassReport};
use crate::profiles::Recommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Payload emitted after each completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassEvent {
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub issues: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub recommendations: Vec<Advice>,
    pub failed: bool,
    /// Significant score change this pass introduced into the history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_change: Option<TrendChange>,
}

impl From<&PassReport> for PassEvent {
    fn from(report: &PassReport) -> Self {
        Self {
            timestamp: report.metadata.timestamp,
            overall_score: report.overall_score,
            issues: report.issues.clone(),
            warnings: report.warnings.clone(),
            recommendations: report.recommendations.clone(),
            failed: report.failed,
            trend_change: None,
        }
    }
}

/// One entry of the payload emitted after a recommendation computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEvent {
    pub profile_id: String,
    pub confidence: f64,
    pub reason: String,
}

impl From<&Recommendation> for RecommendationEvent {
    fn from(rec: &Recommendation) -> Self {
        Self {
            profile_id: rec.profile_id.clone(),
            confidence: rec.confidence,
            reason: rec.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum MonitorEvent {
    PassCompleted(PassEvent),
    RecommendationsComputed(Vec<RecommendationEvent>),
}

/// Receives monitor events. Must not block.
pub trait ReportSink: Send + Sync {
    fn emit(&self, event: MonitorEvent);
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn emit(&self, event: MonitorEvent) {
        match event {
            MonitorEvent::PassCompleted(pass) if pass.failed => {
                warn!("Pass at {} failed", pass.timestamp);
            }
            MonitorEvent::PassCompleted(pass) => {
                info!(
                    "Pass complete: score {:.1}, {} issues, {} warnings",
                    pass.overall_score,
                    pass.issues.len(),
                    pass.warnings.len()
                );
                match pass.trend_change {
                    Some(change) if change.direction == TrendDirection::Regression => {
                        warn!("Score regressed by {:.1} points", -change.score_diff);
                    }
                    Some(change) => {
                        info!("Score improved by {:.1} points", change.score_diff);
                    }
                    None => {}
                }
            }
            MonitorEvent::RecommendationsComputed(recs) => {
                for rec in recs {
                    debug!(
                        "Recommend {} ({:.2}): {}",
                        rec.profile_id, rec.confidence, rec.reason
                    );
                }
            }
        }
    }
}

/// Forwards events into an unbounded channel; a closed receiver drops them.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn emit(&self, event: MonitorEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver closed; dropping event");
        }
    }
}

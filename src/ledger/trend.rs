//! Longitudinal views over the compliance history.
//!
//! Everything here is derived: [`TrendEngine::analyze`] reads the history
//! and returns a fresh [`TrendAnalysis`] without touching its input, so it
//! can be re-run at any time and always yields the same answer for the same
//! history and reference time.

use crate::models::RunSummary;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
/// Score delta (in points) from which a change counts as significant.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 5.0;
/// Number of most recent points a projection is based on.
const PROJECTION_POINTS: usize = 5;
const HIGH_CONFIDENCE_VARIANCE: f64 = 5.0;
const MEDIUM_CONFIDENCE_VARIANCE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improvement,
    Regression,
}

/// Score and issue count of one run inside the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub issue_count: usize,
}

/// A significant score move between two consecutive points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendChange {
    pub timestamp: DateTime<Utc>,
    pub direction: TrendDirection,
    /// Signed delta, newer minus older.
    pub score_diff: f64,
}

impl TrendChange {
    pub fn magnitude(&self) -> f64 {
        self.score_diff.abs()
    }
}

/// A category whose score moved significantly between the last two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShift {
    pub category: String,
    pub direction: TrendDirection,
    pub from: f64,
    pub to: f64,
}

/// Aggregate over one calendar week or month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    /// `2026-W03` for weeks, `2026-01` for months.
    pub period: String,
    pub runs: usize,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub total_issues: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outlook {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionConfidence {
    High,
    Medium,
    Low,
}

/// Naive next-score projection from the recent rate of change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub next_score: f64,
    pub outlook: Outlook,
    pub confidence: ProjectionConfidence,
}

/// Result of one trend computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub points: Vec<TrendPoint>,
    pub changes: Vec<TrendChange>,
    pub weekly: Vec<PeriodAggregate>,
    pub monthly: Vec<PeriodAggregate>,
    pub category_shifts: Vec<CategoryShift>,
    pub projection: Option<Projection>,
}

impl TrendAnalysis {
    /// The change between the two most recent points, if significant.
    pub fn latest_change(&self) -> Option<&TrendChange> {
        let last = self.points.last()?;
        self.changes.last().filter(|c| c.timestamp == last.timestamp)
    }

    pub fn improvements(&self) -> impl Iterator<Item = &TrendChange> {
        self.changes
            .iter()
            .filter(|c| c.direction == TrendDirection::Improvement)
    }

    pub fn regressions(&self) -> impl Iterator<Item = &TrendChange> {
        self.changes
            .iter()
            .filter(|c| c.direction == TrendDirection::Regression)
    }
}

#[derive(Debug, Clone)]
pub struct TrendConfig {
    pub window_days: i64,
    pub significance_threshold: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendEngine {
    config: TrendConfig,
}

impl TrendEngine {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Derive trend views from `history` as seen at `now`.
    pub fn analyze<'a>(
        &self,
        history: impl IntoIterator<Item = &'a RunSummary>,
        now: DateTime<Utc>,
    ) -> TrendAnalysis {
        let window_start = now - Duration::days(self.config.window_days);

        let mut in_window: Vec<&RunSummary> = history
            .into_iter()
            .filter(|s| s.timestamp >= window_start && s.timestamp <= now)
            .collect();
        in_window.sort_by_key(|s| s.timestamp);

        let points: Vec<TrendPoint> = in_window
            .iter()
            .map(|s| TrendPoint {
                timestamp: s.timestamp,
                score: s.overall_score,
                issue_count: s.issue_count,
            })
            .collect();

        let changes = points
            .windows(2)
            .filter_map(|pair| {
                let diff = pair[1].score - pair[0].score;
                self.direction_of(diff).map(|direction| TrendChange {
                    timestamp: pair[1].timestamp,
                    direction,
                    score_diff: diff,
                })
            })
            .collect();

        let category_shifts = match in_window.as_slice() {
            [.., previous, current] => self.category_shifts(previous, current),
            _ => Vec::new(),
        };

        TrendAnalysis {
            weekly: aggregate_by(&in_window, |t| {
                let week = t.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }),
            monthly: aggregate_by(&in_window, |t| t.format("%Y-%m").to_string()),
            projection: project(&points),
            points,
            changes,
            category_shifts,
        }
    }

    fn direction_of(&self, diff: f64) -> Option<TrendDirection> {
        if diff.abs() < self.config.significance_threshold {
            None
        } else if diff > 0.0 {
            Some(TrendDirection::Improvement)
        } else {
            Some(TrendDirection::Regression)
        }
    }

    fn category_shifts(&self, previous: &RunSummary, current: &RunSummary) -> Vec<CategoryShift> {
        current
            .category_scores
            .iter()
            .filter_map(|(category, &to)| {
                let from = *previous.category_scores.get(category)?;
                self.direction_of(to - from).map(|direction| CategoryShift {
                    category: category.clone(),
                    direction,
                    from,
                    to,
                })
            })
            .collect()
    }
}

fn aggregate_by(
    summaries: &[&RunSummary],
    key: impl Fn(&DateTime<Utc>) -> String,
) -> Vec<PeriodAggregate> {
    let mut buckets: BTreeMap<String, Vec<&RunSummary>> = BTreeMap::new();
    for summary in summaries {
        buckets.entry(key(&summary.timestamp)).or_default().push(summary);
    }

    buckets
        .into_iter()
        .map(|(period, runs)| {
            let scores: Vec<f64> = runs.iter().map(|r| r.overall_score).collect();
            PeriodAggregate {
                period,
                runs: runs.len(),
                average_score: scores.iter().sum::<f64>() / scores.len() as f64,
                min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
                max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                total_issues: runs.iter().map(|r| r.issue_count).sum(),
            }
        })
        .collect()
}

fn project(points: &[TrendPoint]) -> Option<Projection> {
    if points.len() < PROJECTION_POINTS {
        return None;
    }

    let recent: Vec<f64> = points[points.len() - PROJECTION_POINTS..]
        .iter()
        .map(|p| p.score)
        .collect();

    let rate = recent.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (recent.len() - 1) as f64;
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    let variance = recent.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / recent.len() as f64;

    let outlook = if rate > 0.0 {
        Outlook::Improving
    } else if rate < 0.0 {
        Outlook::Declining
    } else {
        Outlook::Stable
    };

    let confidence = if variance < HIGH_CONFIDENCE_VARIANCE {
        ProjectionConfidence::High
    } else if variance < MEDIUM_CONFIDENCE_VARIANCE {
        ProjectionConfidence::Medium
    } else {
        ProjectionConfidence::Low
    };

    Some(Projection {
        next_score: (recent[recent.len() - 1] + rate).clamp(0.0, 100.0),
        outlook,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn summary(ts: DateTime<Utc>, score: f64) -> RunSummary {
        RunSummary {
            timestamp: ts,
            overall_score: score,
            category_scores: BTreeMap::new(),
            issue_count: 0,
            warning_count: 0,
        }
    }

    #[test]
    fn test_regression_detected() {
        let history = vec![summary(at(1, 9), 90.0), summary(at(1, 10), 80.0)];
        let analysis = TrendEngine::default().analyze(&history, at(1, 10));

        assert_eq!(analysis.changes.len(), 1);
        let change = &analysis.changes[0];
        assert_eq!(change.direction, TrendDirection::Regression);
        assert_eq!(change.score_diff, -10.0);
        assert_eq!(change.magnitude(), 10.0);
        assert_eq!(analysis.latest_change(), Some(change));
    }

    #[test]
    fn test_small_delta_ignored() {
        let history = vec![summary(at(1, 9), 80.0), summary(at(1, 10), 82.0)];
        let analysis = TrendEngine::default().analyze(&history, at(1, 10));
        assert!(analysis.changes.is_empty());
        assert!(analysis.latest_change().is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let history = vec![summary(at(1, 9), 80.0), summary(at(1, 10), 85.0)];
        let analysis = TrendEngine::default().analyze(&history, at(1, 10));
        assert_eq!(analysis.improvements().count(), 1);
    }

    #[test]
    fn test_window_excludes_old_runs() {
        let old = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let history = vec![summary(old, 20.0), summary(at(20, 0), 90.0)];
        let analysis = TrendEngine::default().analyze(&history, at(25, 0));
        assert_eq!(analysis.points.len(), 1);
        assert!(analysis.changes.is_empty());
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let history: Vec<RunSummary> = (1..=8)
            .map(|d| summary(at(d, 12), 60.0 + (d as f64) * 3.0))
            .collect();
        let engine = TrendEngine::default();
        let first = engine.analyze(&history, at(9, 0));
        let second = engine.analyze(&history, at(9, 0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_period_aggregates() {
        let history = vec![
            summary(at(2, 10), 80.0),
            summary(at(3, 10), 90.0),
            summary(at(20, 10), 70.0),
        ];
        let analysis = TrendEngine::default().analyze(&history, at(21, 0));

        assert_eq!(analysis.monthly.len(), 1);
        assert_eq!(analysis.monthly[0].period, "2026-03");
        assert_eq!(analysis.monthly[0].runs, 3);
        assert_eq!(analysis.monthly[0].average_score, 80.0);
        assert_eq!(analysis.monthly[0].min_score, 70.0);

        // March 2nd and 3rd 2026 share an ISO week; the 20th does not.
        assert_eq!(analysis.weekly.len(), 2);
        assert_eq!(analysis.weekly[0].runs, 2);
    }

    #[test]
    fn test_projection() {
        let history: Vec<RunSummary> = (1..=5)
            .map(|d| summary(at(d, 12), 70.0 + d as f64))
            .collect();
        let analysis = TrendEngine::default().analyze(&history, at(6, 0));
        let projection = analysis.projection.unwrap();
        assert_eq!(projection.outlook, Outlook::Improving);
        assert_eq!(projection.next_score, 76.0);
        assert_eq!(projection.confidence, ProjectionConfidence::High);

        let short = TrendEngine::default().analyze(&history[..3], at(6, 0));
        assert!(short.projection.is_none());
    }

    #[test]
    fn test_category_shifts() {
        let mut before = summary(at(1, 9), 90.0);
        before.category_scores.insert("contrast".to_string(), 90.0);
        before.category_scores.insert("color-blindness".to_string(), 70.0);
        let mut after = summary(at(1, 10), 90.0);
        after.category_scores.insert("contrast".to_string(), 92.0);
        after.category_scores.insert("color-blindness".to_string(), 95.0);

        let history = vec![before, after];
        let analysis = TrendEngine::default().analyze(&history, at(1, 10));
        assert_eq!(analysis.category_shifts.len(), 1);
        assert_eq!(analysis.category_shifts[0].category, "color-blindness");
        assert_eq!(
            analysis.category_shifts[0].direction,
            TrendDirection::Improvement
        );
    }
}

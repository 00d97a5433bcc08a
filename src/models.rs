//! Data models for the compliance monitor.
//!
//! This module contains the core data structures shared across the
//! analysis, ledger and reporting layers: element snapshots, measurements,
//! issues, pass reports and run summaries.

use crate::color::{Deficiency, Rgb};
use crate::error::ColorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// WCAG conformance level used to pick contrast thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WcagLevel {
    A,
    #[default]
    AA,
    AAA,
}

impl fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WcagLevel::A => write!(f, "A"),
            WcagLevel::AA => write!(f, "AA"),
            WcagLevel::AAA => write!(f, "AAA"),
        }
    }
}

impl FromStr for WcagLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(WcagLevel::A),
            "AA" => Ok(WcagLevel::AA),
            "AAA" => Ok(WcagLevel::AAA),
            other => Err(format!("unknown WCAG level: {}", other)),
        }
    }
}

/// Severity tier of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Failing by a small margin, or passing with caveats
    Info,
    /// Noticeably below the required ratio
    Warning,
    /// Less than half the required ratio
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Info => "🔵",
            Severity::Warning => "🟡",
            Severity::Critical => "🔴",
        }
    }
}

/// What kind of check produced an issue. Doubles as the scoring category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Contrast,
    ColorBlindness,
    RuleViolation,
}

impl IssueKind {
    pub const ALL: [IssueKind; 3] = [
        IssueKind::Contrast,
        IssueKind::ColorBlindness,
        IssueKind::RuleViolation,
    ];

    /// Category key used in per-category scores.
    pub fn category(&self) -> &'static str {
        match self {
            IssueKind::Contrast => "contrast",
            IssueKind::ColorBlindness => "color-blindness",
            IssueKind::RuleViolation => "rule-violation",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category())
    }
}

/// A color as delivered by the snapshot provider: a channel triple or a CSS string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Triple([f64; 3]),
    Css(String),
}

impl ColorValue {
    /// Validate into an [`Rgb`]; out-of-range data is an error, never clamped.
    pub fn resolve(&self) -> Result<Rgb, ColorError> {
        match self {
            ColorValue::Triple(channels) => Rgb::try_from(*channels),
            ColorValue::Css(s) => Rgb::parse(s),
        }
    }
}

impl From<Rgb> for ColorValue {
    fn from(rgb: Rgb) -> Self {
        ColorValue::Triple(rgb.channels())
    }
}

/// Font size from which regular-weight text counts as large.
const LARGE_TEXT_PX: f64 = 24.0;
/// Font size from which bold text counts as large.
const LARGE_BOLD_TEXT_PX: f64 = 18.66;
const BOLD_WEIGHT: u16 = 700;

/// One element of the visual surface at the time of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Opaque selector or id.
    pub id: String,
    pub foreground: ColorValue,
    pub background: ColorValue,
    #[serde(default)]
    pub is_large_text: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_px: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<u16>,
}

impl ElementSnapshot {
    pub fn new(id: impl Into<String>, foreground: Rgb, background: Rgb) -> Self {
        Self {
            id: id.into(),
            foreground: foreground.into(),
            background: background.into(),
            is_large_text: false,
            font_size_px: None,
            font_weight: None,
        }
    }

    pub fn large(mut self) -> Self {
        self.is_large_text = true;
        self
    }

    /// Large text is derived from font metrics when present, else the explicit flag.
    pub fn large_text(&self) -> bool {
        match self.font_size_px {
            Some(size) => {
                let bold = self.font_weight.unwrap_or(400) >= BOLD_WEIGHT;
                size >= LARGE_TEXT_PX || (bold && size >= LARGE_BOLD_TEXT_PX)
            }
            None => self.is_large_text,
        }
    }
}

/// Measured contrast of one element against its required ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastMeasurement {
    pub element_id: String,
    pub foreground: Rgb,
    pub background: Rgb,
    pub ratio: f64,
    pub required_ratio: f64,
    pub passes: bool,
}

/// Direction of a suggested foreground adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Darken,
    Lighten,
}

/// Smallest foreground change found that reaches the required ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSuggestion {
    pub foreground: Rgb,
    pub background: Rgb,
    pub contrast_ratio: f64,
    /// Gain over the measured ratio.
    pub improvement: f64,
    pub adjustment: Adjustment,
    pub steps: u32,
}

/// Represents a single finding of a pass.
///
/// Ids are regenerated every pass; compare issue sets by [`Issue::key`]
/// and content, never by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub kind: IssueKind,
    pub severity: Severity,
    pub element_id: String,
    /// Measured ratio (worst simulated ratio for color-blindness issues).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_types: Vec<Deficiency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<ColorSuggestion>,
}

/// Content identity of an issue across passes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssueKey {
    pub kind: IssueKind,
    pub element_id: String,
    pub rule_id: Option<String>,
}

impl Issue {
    pub fn key(&self) -> IssueKey {
        IssueKey {
            kind: self.kind,
            element_id: self.element_id.clone(),
            rule_id: self.rule_id.clone(),
        }
    }

    /// Issues are reported as warnings when only the info tier applies.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Info
    }
}

/// Summary of issues found during a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    /// Issues grouped by category.
    pub by_kind: BTreeMap<String, usize>,
}

impl IssueSummary {
    /// Creates a summary from a list of issues.
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut summary = Self::default();

        for issue in issues {
            summary.total += 1;
            match issue.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Warning => summary.warning += 1,
                Severity::Info => summary.info += 1,
            }

            *summary
                .by_kind
                .entry(issue.kind.category().to_string())
                .or_insert(0) += 1;
        }

        summary
    }
}

/// Priority of a piece of report advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvicePriority {
    High,
    Medium,
    Low,
}

/// Actionable advice derived from a pass's issue set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub priority: AdvicePriority,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub affected_elements: Vec<String>,
}

/// Whether a pass looked at every element or only queued ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Full,
    Incremental,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Full => write!(f, "full"),
            PassKind::Incremental => write!(f, "incremental"),
        }
    }
}

/// An element dropped from a pass because its snapshot was malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedElement {
    pub element_id: String,
    pub reason: String,
}

/// Metadata about a pass report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: DateTime<Utc>,
    pub kind: PassKind,
    pub wcag_level: WcagLevel,
    /// Elements known to the monitor after the pass.
    pub elements_evaluated: usize,
    /// Elements re-evaluated by this pass.
    pub elements_examined: usize,
    pub duration_ms: u64,
}

/// The structured payload emitted after each completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub metadata: ReportMetadata,
    pub overall_score: f64,
    pub grade: String,
    pub category_scores: BTreeMap<String, f64>,
    /// Critical and warning tier issues.
    pub issues: Vec<Issue>,
    /// Info tier issues.
    pub warnings: Vec<Issue>,
    pub summary: IssueSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedElement>,
    pub recommendations: Vec<Advice>,
    /// Set when the pass was aborted; the issue lists are then empty.
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl PassReport {
    /// A non-fatal report for a pass the provider could not serve.
    pub fn failed(metadata: ReportMetadata, reason: String) -> Self {
        Self {
            metadata,
            overall_score: 0.0,
            grade: String::new(),
            category_scores: BTreeMap::new(),
            issues: Vec::new(),
            warnings: Vec::new(),
            summary: IssueSummary::default(),
            skipped: Vec::new(),
            recommendations: Vec::new(),
            failed: true,
            failure: Some(reason),
        }
    }

    /// Number of issues found; zero for failed passes.
    pub fn issues_found(&self) -> usize {
        self.issues.len() + self.warnings.len()
    }

    /// All findings, most severe first.
    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().chain(self.warnings.iter())
    }
}

/// One entry of the compliance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub category_scores: BTreeMap<String, f64>,
    pub issue_count: usize,
    pub warning_count: usize,
}

impl RunSummary {
    pub fn from_report(report: &PassReport) -> Self {
        Self {
            timestamp: report.metadata.timestamp,
            overall_score: report.overall_score,
            category_scores: report.category_scores.clone(),
            issue_count: report.issues.len(),
            warning_count: report.warnings.len(),
        }
    }
}

/// Letter grade for a compliance score.
pub fn score_grade(score: f64) -> &'static str {
    match score {
        s if s >= 95.0 => "A+",
        s if s >= 90.0 => "A",
        s if s >= 85.0 => "B+",
        s if s >= 80.0 => "B",
        s if s >= 75.0 => "C+",
        s if s >= 70.0 => "C",
        s if s >= 65.0 => "D+",
        s if s >= 60.0 => "D",
        _ => "F",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_severity_emoji() {
        assert_eq!(Severity::Critical.emoji(), "🔴");
        assert_eq!(Severity::Warning.emoji(), "🟡");
        assert_eq!(Severity::Info.emoji(), "🔵");
    }

    #[test]
    fn test_wcag_level_from_str() {
        assert_eq!("aa".parse::<WcagLevel>(), Ok(WcagLevel::AA));
        assert_eq!("AAA".parse::<WcagLevel>(), Ok(WcagLevel::AAA));
        assert_eq!(" a ".parse::<WcagLevel>(), Ok(WcagLevel::A));
        assert!("B".parse::<WcagLevel>().is_err());
    }

    #[test]
    fn test_large_text_from_metrics() {
        let base = ElementSnapshot::new("p", Rgb::BLACK, Rgb::WHITE);
        assert!(!base.large_text());
        assert!(base.clone().large().large_text());

        let big = ElementSnapshot {
            font_size_px: Some(24.0),
            ..base.clone()
        };
        assert!(big.large_text());

        let bold = ElementSnapshot {
            font_size_px: Some(19.0),
            font_weight: Some(700),
            ..base.clone()
        };
        assert!(bold.large_text());

        // Metrics win over the flag.
        let small = ElementSnapshot {
            font_size_px: Some(12.0),
            is_large_text: true,
            ..base
        };
        assert!(!small.large_text());
    }

    #[test]
    fn test_snapshot_accepts_css_and_triples() {
        let json = r##"{"id": "#title", "foreground": "#333", "background": [255, 255, 255]}"##;
        let snapshot: ElementSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.foreground.resolve().unwrap().to_hex(), "#333333");
        assert_eq!(snapshot.background.resolve().unwrap(), Rgb::WHITE);

        let bad = ColorValue::Triple([0.0, 300.0, 0.0]);
        assert!(bad.resolve().is_err());
    }

    #[test]
    fn test_issue_summary() {
        let issue = |kind, severity| Issue {
            id: Uuid::new_v4(),
            kind,
            severity,
            element_id: "x".to_string(),
            ratio: None,
            required_ratio: None,
            foreground: None,
            background: None,
            affected_types: Vec::new(),
            rule_id: None,
            message: String::new(),
            suggestion: None,
        };
        let issues = vec![
            issue(IssueKind::Contrast, Severity::Critical),
            issue(IssueKind::Contrast, Severity::Info),
            issue(IssueKind::ColorBlindness, Severity::Warning),
        ];

        let summary = IssueSummary::from_issues(&issues);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.info, 1);
        assert_eq!(summary.by_kind.get("contrast"), Some(&2));
        assert_eq!(summary.by_kind.get("color-blindness"), Some(&1));
    }

    #[test]
    fn test_score_grade() {
        assert_eq!(score_grade(100.0), "A+");
        assert_eq!(score_grade(90.0), "A");
        assert_eq!(score_grade(72.5), "C");
        assert_eq!(score_grade(12.0), "F");
    }
}

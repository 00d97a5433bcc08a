//! Issue aggregation and statistics.
//!
//! This module provides utilities for scoring element outcomes, ordering
//! issues and deriving report-level advice from an issue set.

use super::evaluator::ElementOutcome;
use crate::models::{Advice, AdvicePriority, Issue, IssueKind, IssueSummary, Severity};
use std::collections::BTreeMap;

/// Average contrast below which the whole surface gets general advice.
pub const LOW_AVERAGE_CONTRAST: f64 = 4.5;

/// Score for a pass: share of evaluated elements that pass, times 100.
///
/// An empty surface has nothing to fail and scores 100.
pub fn overall_score<'a>(outcomes: impl IntoIterator<Item = &'a ElementOutcome>) -> f64 {
    let (passed, total) = outcomes
        .into_iter()
        .fold((0usize, 0usize), |(passed, total), o| {
            (passed + usize::from(o.passes()), total + 1)
        });
    percentage(passed, total)
}

/// Per-category scores: share of elements without an issue of that kind.
///
/// The contrast category uses the measurement result directly so it matches
/// [`overall_score`].
pub fn category_scores<'a>(
    outcomes: impl IntoIterator<Item = &'a ElementOutcome> + Clone,
) -> BTreeMap<String, f64> {
    IssueKind::ALL
        .iter()
        .map(|kind| {
            let (clean, total) = outcomes.clone().into_iter().fold((0, 0), |(clean, total), o| {
                let ok = match kind {
                    IssueKind::Contrast => o.passes(),
                    other => !o.has_issue_of(*other),
                };
                (clean + usize::from(ok), total + 1)
            });
            (kind.category().to_string(), percentage(clean, total))
        })
        .collect()
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Sort issues by severity (critical first), then by element.
pub fn sort_issues_by_severity(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.element_id.cmp(&b.element_id))
    });
}

/// Group issues by severity.
pub fn group_by_severity(issues: &[Issue]) -> BTreeMap<Severity, Vec<Issue>> {
    let mut grouped: BTreeMap<Severity, Vec<Issue>> = BTreeMap::new();

    for issue in issues {
        grouped.entry(issue.severity).or_default().push(issue.clone());
    }

    grouped
}

/// Mean measured contrast over contrast issues; 0 when there are none.
pub fn average_contrast(issues: &[Issue]) -> f64 {
    let ratios: Vec<f64> = issues
        .iter()
        .filter(|i| i.kind == IssueKind::Contrast)
        .filter_map(|i| i.ratio)
        .collect();

    if ratios.is_empty() {
        0.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    }
}

/// Derive prioritized advice from an issue set.
pub fn generate_advice(issues: &[Issue]) -> Vec<Advice> {
    let mut advice = Vec::new();

    let critical: Vec<String> = issues
        .iter()
        .filter(|i| i.kind == IssueKind::Contrast && i.severity == Severity::Critical)
        .map(|i| i.element_id.clone())
        .collect();
    if !critical.is_empty() {
        advice.push(Advice {
            priority: AdvicePriority::High,
            kind: "contrast".to_string(),
            title: "Fix critical contrast failures".to_string(),
            description: format!(
                "{} element(s) have less than half the required contrast and need immediate attention.",
                critical.len()
            ),
            affected_elements: critical,
        });
    }

    let color_blind: Vec<String> = issues
        .iter()
        .filter(|i| i.kind == IssueKind::ColorBlindness)
        .map(|i| i.element_id.clone())
        .collect();
    if !color_blind.is_empty() {
        advice.push(Advice {
            priority: AdvicePriority::Medium,
            kind: "color-blindness".to_string(),
            title: "Do not rely on color alone".to_string(),
            description: format!(
                "{} element(s) become hard to read under a color vision deficiency. Add patterns, symbols or stronger luminance differences.",
                color_blind.len()
            ),
            affected_elements: color_blind,
        });
    }

    let average = average_contrast(issues);
    if average > 0.0 && average < LOW_AVERAGE_CONTRAST {
        advice.push(Advice {
            priority: AdvicePriority::Medium,
            kind: "general".to_string(),
            title: "Raise overall contrast".to_string(),
            description: format!(
                "Average contrast of failing elements is {:.2}:1. Consider a darker text palette across the surface.",
                average
            ),
            affected_elements: Vec::new(),
        });
    }

    advice.sort_by_key(|a| a.priority);
    advice
}

/// Generate a text summary of issue statistics.
pub fn generate_summary_text(summary: &IssueSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Issues: {}", summary.total));
    lines.push(format!(
        "- {} Critical: {}",
        Severity::Critical.emoji(),
        summary.critical
    ));
    lines.push(format!(
        "- {} Warning: {}",
        Severity::Warning.emoji(),
        summary.warning
    ));
    lines.push(format!("- {} Info: {}", Severity::Info.emoji(), summary.info));

    if !summary.by_kind.is_empty() {
        lines.push(String::new());
        lines.push("By Category:".to_string());

        let mut kinds: Vec<_> = summary.by_kind.iter().collect();
        kinds.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (kind, count) in kinds {
            lines.push(format!("- {}: {}", kind, count));
        }
    }

    lines.join("\n")
}

//! Markdown and JSON report generation.
//!
//! Renders a [`ComplianceDocument`] (the latest pass, the history around it,
//! its trend analysis and the current profile recommendations).

use super::ComplianceDocument;
use crate::analysis::{average_contrast, group_by_severity};
use crate::ledger::trend::{Outlook, PeriodAggregate, TrendAnalysis, TrendDirection};
use crate::models::{
    Adjustment, Advice, AdvicePriority, Issue, IssueKind, IssueSummary, PassReport, ReportMetadata,
    RunSummary, Severity,
};
use crate::profiles::Recommendations;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(doc: &ComplianceDocument) -> String {
    let mut output = String::new();

    output.push_str("# ContrastWatch Compliance Report\n\n");

    output.push_str(&generate_metadata_section(&doc.report.metadata));

    if doc.report.failed {
        output.push_str(&generate_failure_section(&doc.report));
        output.push_str(&generate_footer());
        return output;
    }

    output.push_str(&generate_table_of_contents(doc));
    output.push_str(&generate_score_section(&doc.report));
    output.push_str(&generate_summary_section(&doc.report.summary, &doc.report));
    output.push_str(&generate_issues_section(&doc.report));
    output.push_str(&generate_advice_section(&doc.report.recommendations));
    output.push_str(&generate_trend_section(&doc.history, &doc.trend));
    output.push_str(&generate_profiles_section(&doc.recommendations));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Pass Date:** {}\n",
        metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Pass Kind:** {}\n", metadata.kind));
    section.push_str(&format!("- **WCAG Level:** {}\n", metadata.wcag_level));
    section.push_str(&format!(
        "- **Elements Evaluated:** {}\n",
        metadata.elements_evaluated
    ));
    if metadata.elements_examined != metadata.elements_evaluated {
        section.push_str(&format!(
            "- **Elements Re-examined:** {}\n",
            metadata.elements_examined
        ));
    }
    section.push_str(&format!(
        "- **Pass Duration:** {:.3}s\n",
        metadata.duration_ms as f64 / 1000.0
    ));
    section.push('\n');

    section
}

fn generate_failure_section(report: &PassReport) -> String {
    let mut section = String::new();

    section.push_str("## Pass Failed\n\n");
    section.push_str(&format!(
        "The pass could not complete: {}\n\n",
        report.failure.as_deref().unwrap_or("unknown reason")
    ));
    section.push_str("The previous findings remain in effect until the next successful pass.\n\n");

    section
}

fn generate_table_of_contents(doc: &ComplianceDocument) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Score](#score)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Issues by Severity](#issues-by-severity)\n");

    if !doc.report.recommendations.is_empty() {
        toc.push_str("- [Advice](#advice)\n");
    }
    if !doc.history.is_empty() {
        toc.push_str("- [Trend](#trend)\n");
    }
    if !doc.recommendations.surfaced.is_empty() {
        toc.push_str("- [Recommended Profiles](#recommended-profiles)\n");
    }

    toc.push('\n');

    toc
}

fn generate_score_section(report: &PassReport) -> String {
    let mut section = String::new();

    section.push_str("## Score\n\n");
    section.push_str(&format!(
        "**{:.1} / 100** (grade **{}**)\n\n",
        report.overall_score, report.grade
    ));

    if !report.category_scores.is_empty() {
        section.push_str("| Category | Score |\n");
        section.push_str("|:---|:---:|\n");
        for (category, score) in &report.category_scores {
            section.push_str(&format!("| {} | {:.1} |\n", category, score));
        }
        section.push('\n');
    }

    section
}

fn generate_summary_section(summary: &IssueSummary, report: &PassReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    section.push_str("### Issue Severity Breakdown\n\n");
    section.push_str(&format!(
        "| {} Critical | {} Warning | {} Info | **Total** |\n",
        Severity::Critical.emoji(),
        Severity::Warning.emoji(),
        Severity::Info.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.critical, summary.warning, summary.info, summary.total
    ));

    if !summary.by_kind.is_empty() {
        section.push_str("### Issues by Kind\n\n");
        section.push_str("| Kind | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut kinds: Vec<_> = summary.by_kind.iter().collect();
        kinds.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (kind, count) in kinds {
            section.push_str(&format!("| {} | {} |\n", kind, count));
        }
        section.push('\n');
    }

    let contrast_issues: Vec<Issue> = report
        .all_issues()
        .filter(|i| i.kind == IssueKind::Contrast)
        .cloned()
        .collect();
    if !contrast_issues.is_empty() {
        section.push_str(&format!(
            "Average contrast among failing elements: **{:.2}:1**\n\n",
            average_contrast(&contrast_issues)
        ));
    }

    if !report.skipped.is_empty() {
        section.push_str("### Skipped Elements\n\n");
        for skipped in &report.skipped {
            section.push_str(&format!("- `{}`: {}\n", skipped.element_id, skipped.reason));
        }
        section.push('\n');
    }

    section
}

fn generate_issues_section(report: &PassReport) -> String {
    let mut section = String::new();

    section.push_str("## Issues by Severity\n\n");

    let all: Vec<Issue> = report.all_issues().cloned().collect();
    if all.is_empty() {
        section.push_str("No issues were found on the surface. Great job! 🎉\n\n");
        return section;
    }

    for (severity, issues) in group_by_severity(&all).into_iter().rev() {
        section.push_str(&format!(
            "### {} {} ({})\n\n",
            severity.emoji(),
            severity,
            issues.len()
        ));
        for issue in &issues {
            section.push_str(&generate_issue_block(issue));
        }
    }

    section
}

/// Generate a single issue block.
fn generate_issue_block(issue: &Issue) -> String {
    let mut block = String::new();

    let severity_badge = match issue.severity {
        Severity::Critical => "🔴 **CRITICAL**",
        Severity::Warning => "🟡 **WARNING**",
        Severity::Info => "🔵 **INFO**",
    };

    block.push_str(&format!(
        "#### {} {} - `{}`\n\n",
        severity_badge, issue.kind, issue.element_id
    ));

    block.push_str(&format!("{}\n\n", issue.message));

    if let (Some(ratio), Some(required)) = (issue.ratio, issue.required_ratio) {
        block.push_str(&format!(
            "**Contrast:** {:.2}:1 (required {:.1}:1)\n\n",
            ratio, required
        ));
    }
    if let (Some(fg), Some(bg)) = (issue.foreground, issue.background) {
        block.push_str(&format!("**Colors:** `{}` on `{}`\n\n", fg, bg));
    }
    if !issue.affected_types.is_empty() {
        let types: Vec<String> = issue.affected_types.iter().map(|d| d.to_string()).collect();
        block.push_str(&format!("**Affected vision types:** {}\n\n", types.join(", ")));
    }
    if let Some(rule) = &issue.rule_id {
        block.push_str(&format!("**Rule:** `{}`\n\n", rule));
    }

    if let Some(suggestion) = &issue.suggestion {
        block.push_str(&format!(
            "> 💡 **Suggestion:** {} the foreground to `{}` for {:.2}:1 (+{:.2})\n\n",
            match suggestion.adjustment {
                Adjustment::Darken => "Darken",
                Adjustment::Lighten => "Lighten",
            },
            suggestion.foreground,
            suggestion.contrast_ratio,
            suggestion.improvement
        ));
    }

    block.push_str("---\n\n");

    block
}

fn generate_advice_section(advice: &[Advice]) -> String {
    if advice.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Advice\n\n");

    for (i, entry) in advice.iter().enumerate() {
        let priority = match entry.priority {
            AdvicePriority::High => "high",
            AdvicePriority::Medium => "medium",
            AdvicePriority::Low => "low",
        };
        section.push_str(&format!(
            "{}. **{}** ({} priority): {}\n",
            i + 1,
            entry.title,
            priority,
            entry.description
        ));
        if !entry.affected_elements.is_empty() {
            section.push_str(&format!(
                "   Elements: {}\n",
                entry
                    .affected_elements
                    .iter()
                    .map(|e| format!("`{}`", e))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
    section.push('\n');

    section
}

fn generate_trend_section(history: &[RunSummary], trend: &TrendAnalysis) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Trend\n\n");

    section.push_str("### Recent Runs\n\n");
    section.push_str("| Date | Score | Issues | Warnings |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");
    for run in history.iter().rev() {
        section.push_str(&format!(
            "| {} | {:.1} | {} | {} |\n",
            run.timestamp.format("%Y-%m-%d %H:%M"),
            run.overall_score,
            run.issue_count,
            run.warning_count
        ));
    }
    section.push('\n');

    if trend.changes.is_empty() {
        section.push_str("No significant score changes in the window.\n\n");
    } else {
        section.push_str("### Significant Changes\n\n");
        for change in &trend.changes {
            let marker = match change.direction {
                TrendDirection::Improvement => "📈 Improvement",
                TrendDirection::Regression => "📉 Regression",
            };
            section.push_str(&format!(
                "- {} of {:+.1} points at {}\n",
                marker,
                change.score_diff,
                change.timestamp.format("%Y-%m-%d %H:%M")
            ));
        }
        section.push('\n');
    }

    for shift in &trend.category_shifts {
        section.push_str(&format!(
            "- Category **{}** moved from {:.1} to {:.1}\n",
            shift.category, shift.from, shift.to
        ));
    }
    if !trend.category_shifts.is_empty() {
        section.push('\n');
    }

    section.push_str(&generate_period_table("Weekly", &trend.weekly));
    section.push_str(&generate_period_table("Monthly", &trend.monthly));

    if let Some(projection) = &trend.projection {
        let outlook = match projection.outlook {
            Outlook::Improving => "improving",
            Outlook::Declining => "declining",
            Outlook::Stable => "stable",
        };
        section.push_str(&format!(
            "Projected next score: **{:.1}** ({}, {:?} confidence)\n\n",
            projection.next_score, outlook, projection.confidence
        ));
    }

    section
}

fn generate_period_table(label: &str, periods: &[PeriodAggregate]) -> String {
    if periods.is_empty() {
        return String::new();
    }

    let mut table = String::new();
    table.push_str(&format!("### {} Aggregates\n\n", label));
    table.push_str("| Period | Runs | Average | Min | Max | Issues |\n");
    table.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for p in periods {
        table.push_str(&format!(
            "| {} | {} | {:.1} | {:.1} | {:.1} | {} |\n",
            p.period, p.runs, p.average_score, p.min_score, p.max_score, p.total_issues
        ));
    }
    table.push('\n');
    table
}

fn generate_profiles_section(recommendations: &Recommendations) -> String {
    if recommendations.surfaced.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommended Profiles\n\n");
    section.push_str("| Profile | Confidence | Reason |\n");
    section.push_str("|:---|:---:|:---|\n");
    for rec in &recommendations.surfaced {
        section.push_str(&format!(
            "| `{}` | {:.0}% | {} |\n",
            rec.profile_id,
            rec.confidence * 100.0,
            rec.reason
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by ContrastWatch*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(doc: &ComplianceDocument) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(Into::into)
}

/// Write rendered report content, creating parent directories as needed.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

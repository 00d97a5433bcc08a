//! Issue classification for contrast measurements.
//!
//! Maps a measured ratio and the configured WCAG level to a severity tier,
//! and searches a bounded adjustment space for a foreground color that
//! would pass.

use crate::color::{contrast_ratio, Rgb};
use crate::models::{
    Adjustment, ColorSuggestion, ContrastMeasurement, Issue, IssueKind, Severity, WcagLevel,
};
use uuid::Uuid;

/// Below this fraction of the required ratio an issue is critical.
pub const CRITICAL_FRACTION: f64 = 0.5;
/// Below this fraction of the required ratio an issue is a warning.
pub const WARNING_FRACTION: f64 = 0.8;

/// Step size of one foreground adjustment, as a blend fraction.
pub const DEFAULT_SUGGESTION_STEP: f64 = 0.05;
pub const DEFAULT_SUGGESTION_MAX_STEPS: u32 = 20;

/// Required contrast ratio for a level and text size.
///
/// WCAG 2.x only sets a text contrast minimum from AA upwards, so level A
/// gets its own looser table (3.0 for every text size) rather than silently
/// reusing the AA thresholds.
pub fn required_ratio(level: WcagLevel, large_text: bool) -> f64 {
    match (level, large_text) {
        (WcagLevel::AAA, false) => 7.0,
        (WcagLevel::AAA, true) => 4.5,
        (WcagLevel::AA, false) => 4.5,
        (WcagLevel::AA, true) => 3.0,
        (WcagLevel::A, _) => 3.0,
    }
}

/// Severity for a measured/required pair. Total and deterministic.
pub fn classify_severity(ratio: f64, required: f64) -> Severity {
    if required <= 0.0 {
        return Severity::Info;
    }

    let fraction = ratio / required;
    if fraction < CRITICAL_FRACTION {
        Severity::Critical
    } else if fraction < WARNING_FRACTION {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Settings for classification and suggestion search.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub level: WcagLevel,
    pub suggestion_step: f64,
    pub suggestion_max_steps: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            level: WcagLevel::AA,
            suggestion_step: DEFAULT_SUGGESTION_STEP,
            suggestion_max_steps: DEFAULT_SUGGESTION_MAX_STEPS,
        }
    }
}

/// Turns measurements into issues.
#[derive(Debug, Clone, Default)]
pub struct IssueClassifier {
    config: ClassifierConfig,
}

impl IssueClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn level(&self) -> WcagLevel {
        self.config.level
    }

    pub fn required_ratio(&self, large_text: bool) -> f64 {
        required_ratio(self.config.level, large_text)
    }

    /// Measure a color pair against the configured level.
    pub fn measure(
        &self,
        element_id: &str,
        foreground: Rgb,
        background: Rgb,
        large_text: bool,
    ) -> ContrastMeasurement {
        let ratio = contrast_ratio(foreground, background);
        let required = self.required_ratio(large_text);
        ContrastMeasurement {
            element_id: element_id.to_string(),
            foreground,
            background,
            ratio,
            required_ratio: required,
            passes: ratio >= required,
        }
    }

    /// Build an issue for a failing measurement; passing ones yield `None`.
    pub fn classify(&self, measurement: &ContrastMeasurement) -> Option<Issue> {
        if measurement.passes {
            return None;
        }

        let severity = classify_severity(measurement.ratio, measurement.required_ratio);
        let suggestion = self.suggest(
            measurement.foreground,
            measurement.background,
            measurement.required_ratio,
        );

        Some(Issue {
            id: Uuid::new_v4(),
            kind: IssueKind::Contrast,
            severity,
            element_id: measurement.element_id.clone(),
            ratio: Some(measurement.ratio),
            required_ratio: Some(measurement.required_ratio),
            foreground: Some(measurement.foreground),
            background: Some(measurement.background),
            affected_types: Vec::new(),
            rule_id: None,
            message: format!(
                "Contrast ratio {:.2}:1 is below the WCAG {} minimum of {}:1",
                measurement.ratio, self.config.level, measurement.required_ratio
            ),
            suggestion,
        })
    }

    /// Smallest darken/lighten of the foreground that reaches `required`.
    ///
    /// Returns `None` when no step within the search bound passes.
    pub fn suggest(&self, foreground: Rgb, background: Rgb, required: f64) -> Option<ColorSuggestion> {
        self.suggest_with(foreground, background, required, contrast_ratio)
    }

    /// Like [`suggest`](Self::suggest), but candidates are judged by `ratio`,
    /// e.g. the worst ratio under a set of simulated deficiencies.
    pub fn suggest_with(
        &self,
        foreground: Rgb,
        background: Rgb,
        required: f64,
        ratio: impl Fn(Rgb, Rgb) -> f64,
    ) -> Option<ColorSuggestion> {
        let original = ratio(foreground, background);

        for step in 1..=self.config.suggestion_max_steps {
            let amount = (step as f64 * self.config.suggestion_step).min(1.0);

            let best = [
                (Adjustment::Darken, foreground.mix(Rgb::BLACK, amount)),
                (Adjustment::Lighten, foreground.mix(Rgb::WHITE, amount)),
            ]
            .into_iter()
            .map(|(adjustment, candidate)| (adjustment, candidate, ratio(candidate, background)))
            .filter(|(_, _, ratio)| *ratio >= required)
            .max_by(|a, b| a.2.total_cmp(&b.2));

            if let Some((adjustment, candidate, reached)) = best {
                return Some(ColorSuggestion {
                    foreground: candidate,
                    background,
                    contrast_ratio: reached,
                    improvement: reached - original,
                    adjustment,
                    steps: step,
                });
            }

            if amount >= 1.0 {
                break;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(v: f64) -> Rgb {
        Rgb::new(v, v, v).unwrap()
    }

    #[test]
    fn test_required_ratio_table() {
        assert_eq!(required_ratio(WcagLevel::AAA, false), 7.0);
        assert_eq!(required_ratio(WcagLevel::AAA, true), 4.5);
        assert_eq!(required_ratio(WcagLevel::AA, false), 4.5);
        assert_eq!(required_ratio(WcagLevel::AA, true), 3.0);
        assert_eq!(required_ratio(WcagLevel::A, false), 3.0);
        assert_eq!(required_ratio(WcagLevel::A, true), 3.0);
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(classify_severity(2.0, 4.5), Severity::Critical);
        assert_eq!(classify_severity(2.25, 4.5), Severity::Warning);
        assert_eq!(classify_severity(3.5, 4.5), Severity::Warning);
        assert_eq!(classify_severity(3.6, 4.5), Severity::Info);
        assert_eq!(classify_severity(5.0, 4.5), Severity::Info);
    }

    #[test]
    fn test_severity_deterministic() {
        for _ in 0..100 {
            assert_eq!(classify_severity(3.1, 7.0), Severity::Critical);
            assert_eq!(classify_severity(4.0, 7.0), Severity::Warning);
        }
    }

    #[test]
    fn test_passing_measurement_has_no_issue() {
        let classifier = IssueClassifier::default();
        let m = classifier.measure("body", Rgb::BLACK, Rgb::WHITE, false);
        assert!(m.passes);
        assert!(classifier.classify(&m).is_none());
    }

    #[test]
    fn test_failing_measurement_with_suggestion() {
        let classifier = IssueClassifier::default();
        let m = classifier.measure(".muted", gray(150.0), Rgb::WHITE, false);
        assert!(!m.passes);

        let issue = classifier.classify(&m).unwrap();
        assert_eq!(issue.kind, IssueKind::Contrast);
        assert_eq!(issue.element_id, ".muted");

        let suggestion = issue.suggestion.unwrap();
        assert_eq!(suggestion.adjustment, Adjustment::Darken);
        assert!(suggestion.contrast_ratio >= 4.5);
        assert!(suggestion.improvement > 0.0);

        // The step before the suggested one must not have passed.
        if suggestion.steps > 1 {
            let previous = gray(150.0).mix(Rgb::BLACK, (suggestion.steps - 1) as f64 * 0.05);
            assert!(contrast_ratio(previous, Rgb::WHITE) < 4.5);
        }
    }

    #[test]
    fn test_no_suggestion_when_unreachable() {
        let classifier = IssueClassifier::new(ClassifierConfig {
            level: WcagLevel::AAA,
            ..ClassifierConfig::default()
        });
        // No foreground reaches 7:1 against mid gray.
        assert!(classifier.suggest(gray(120.0), gray(119.0), 7.0).is_none());
    }

    #[test]
    fn test_suggest_with_custom_ratio() {
        let classifier = IssueClassifier::default();
        // Normal vision would accept the first step; the custom judge never does.
        assert!(classifier.suggest(gray(119.0), Rgb::WHITE, 4.5).is_some());
        assert!(classifier
            .suggest_with(gray(119.0), Rgb::WHITE, 4.5, |_, _| 1.0)
            .is_none());
    }

    #[test]
    fn test_large_text_uses_looser_threshold() {
        let classifier = IssueClassifier::default();
        let m = classifier.measure("h1", gray(130.0), Rgb::WHITE, true);
        assert_eq!(m.required_ratio, 3.0);
        assert!(m.passes);
    }
}

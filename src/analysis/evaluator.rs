//! Per-element evaluation.
//!
//! Resolves a snapshot's colors, measures contrast, simulates color vision
//! deficiencies and consults the rule catalog. Each element is evaluated in
//! isolation so one malformed snapshot cannot abort a pass.

use super::classifier::{classify_severity, IssueClassifier};
use crate::color::{contrast_ratio, simulate_color_blindness, Deficiency};
use crate::error::ColorError;
use crate::models::{ContrastMeasurement, ElementSnapshot, Issue, IssueKind};
use crate::provider::RuleCatalog;
use uuid::Uuid;

/// Everything one pass learned about one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementOutcome {
    pub measurement: ContrastMeasurement,
    pub issues: Vec<Issue>,
}

impl ElementOutcome {
    pub fn element_id(&self) -> &str {
        &self.measurement.element_id
    }

    pub fn passes(&self) -> bool {
        self.measurement.passes
    }

    pub fn has_issue_of(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

/// Evaluates element snapshots into outcomes.
pub struct ElementEvaluator<'a> {
    classifier: &'a IssueClassifier,
    rules: &'a dyn RuleCatalog,
    simulate_color_blindness: bool,
}

impl<'a> ElementEvaluator<'a> {
    pub fn new(
        classifier: &'a IssueClassifier,
        rules: &'a dyn RuleCatalog,
        simulate_color_blindness: bool,
    ) -> Self {
        Self {
            classifier,
            rules,
            simulate_color_blindness,
        }
    }

    /// Evaluate one snapshot. Fails only on malformed color data.
    pub fn evaluate(&self, snapshot: &ElementSnapshot) -> Result<ElementOutcome, ColorError> {
        let foreground = snapshot.foreground.resolve()?;
        let background = snapshot.background.resolve()?;

        let measurement =
            self.classifier
                .measure(&snapshot.id, foreground, background, snapshot.large_text());

        let mut issues = Vec::new();
        if let Some(issue) = self.classifier.classify(&measurement) {
            issues.push(issue);
        } else if self.simulate_color_blindness {
            issues.extend(self.color_blindness_issue(&measurement));
        }

        issues.extend(self.rules.evaluate(snapshot).into_iter().map(|finding| Issue {
            id: Uuid::new_v4(),
            kind: IssueKind::RuleViolation,
            severity: finding.severity,
            element_id: snapshot.id.clone(),
            ratio: None,
            required_ratio: None,
            foreground: None,
            background: None,
            affected_types: Vec::new(),
            rule_id: Some(finding.rule_id),
            message: finding.message,
            suggestion: None,
        }));

        Ok(ElementOutcome {
            measurement,
            issues,
        })
    }

    /// Pairs that pass normally but fail under one or more deficiencies.
    fn color_blindness_issue(&self, measurement: &ContrastMeasurement) -> Option<Issue> {
        let simulated: Vec<(Deficiency, f64)> = Deficiency::ALL
            .iter()
            .map(|&deficiency| {
                let ratio = contrast_ratio(
                    simulate_color_blindness(measurement.foreground, deficiency),
                    simulate_color_blindness(measurement.background, deficiency),
                );
                (deficiency, ratio)
            })
            .filter(|(_, ratio)| *ratio < measurement.required_ratio)
            .collect();

        let worst = simulated
            .iter()
            .map(|(_, ratio)| *ratio)
            .min_by(|a, b| a.total_cmp(b))?;

        let affected_types: Vec<Deficiency> = simulated.into_iter().map(|(d, _)| d).collect();
        let names: Vec<String> = affected_types.iter().map(|d| d.to_string()).collect();

        // The fix must hold under normal vision and every affected deficiency.
        let suggestion = self.classifier.suggest_with(
            measurement.foreground,
            measurement.background,
            measurement.required_ratio,
            |fg, bg| {
                affected_types
                    .iter()
                    .map(|&d| {
                        contrast_ratio(simulate_color_blindness(fg, d), simulate_color_blindness(bg, d))
                    })
                    .fold(contrast_ratio(fg, bg), f64::min)
            },
        );

        Some(Issue {
            id: Uuid::new_v4(),
            kind: IssueKind::ColorBlindness,
            severity: classify_severity(worst, measurement.required_ratio),
            element_id: measurement.element_id.clone(),
            ratio: Some(worst),
            required_ratio: Some(measurement.required_ratio),
            foreground: Some(measurement.foreground),
            background: Some(measurement.background),
            affected_types,
            rule_id: None,
            message: format!(
                "Color pair drops to {:.2}:1 for users with {}",
                worst,
                names.join(", ")
            ),
            suggestion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::models::{ColorValue, Severity};
    use crate::provider::{NoRules, RuleFinding};

    struct AltTextRule;

    impl RuleCatalog for AltTextRule {
        fn evaluate(&self, element: &ElementSnapshot) -> Vec<RuleFinding> {
            if element.id.starts_with("img") {
                vec![RuleFinding {
                    rule_id: "1.1.1".to_string(),
                    severity: Severity::Warning,
                    message: "Image has no text alternative".to_string(),
                }]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_invalid_color_is_error() {
        let classifier = IssueClassifier::default();
        let evaluator = ElementEvaluator::new(&classifier, &NoRules, true);
        let snapshot = ElementSnapshot {
            foreground: ColorValue::Triple([0.0, 0.0, 999.0]),
            ..ElementSnapshot::new("bad", Rgb::BLACK, Rgb::WHITE)
        };
        assert!(evaluator.evaluate(&snapshot).is_err());
    }

    #[test]
    fn test_passing_element_has_no_contrast_issue() {
        let classifier = IssueClassifier::default();
        let evaluator = ElementEvaluator::new(&classifier, &NoRules, true);
        let outcome = evaluator
            .evaluate(&ElementSnapshot::new("body", Rgb::BLACK, Rgb::WHITE))
            .unwrap();
        assert!(outcome.passes());
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_color_blindness_issue_for_blue_on_white() {
        let classifier = IssueClassifier::default();
        let evaluator = ElementEvaluator::new(&classifier, &NoRules, true);

        // Pure blue on white is ~8.6:1, but blue brightens under tritanopia.
        let blue = Rgb::new(0.0, 0.0, 255.0).unwrap();
        let outcome = evaluator
            .evaluate(&ElementSnapshot::new("a.link", blue, Rgb::WHITE))
            .unwrap();
        assert!(outcome.passes());

        let issue = outcome
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::ColorBlindness)
            .expect("color-blindness issue");
        assert!(issue.affected_types.contains(&Deficiency::Tritanopia));
        assert!(!issue.affected_types.contains(&Deficiency::Achromatopsia));
        assert_eq!(issue.severity, Severity::Info);
        assert!(issue.ratio.unwrap() < 4.5);
    }

    #[test]
    fn test_color_blindness_suggestion_passes_under_affected_types() {
        let classifier = IssueClassifier::default();
        let evaluator = ElementEvaluator::new(&classifier, &NoRules, true);

        let blue = Rgb::new(0.0, 0.0, 255.0).unwrap();
        let outcome = evaluator
            .evaluate(&ElementSnapshot::new("a.link", blue, Rgb::WHITE))
            .unwrap();
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::ColorBlindness)
            .unwrap();
        let suggestion = issue.suggestion.as_ref().unwrap();
        let required = issue.required_ratio.unwrap();

        assert!(contrast_ratio(suggestion.foreground, Rgb::WHITE) >= required);
        for &deficiency in &issue.affected_types {
            let simulated = contrast_ratio(
                simulate_color_blindness(suggestion.foreground, deficiency),
                simulate_color_blindness(Rgb::WHITE, deficiency),
            );
            assert!(simulated >= required, "{} still at {:.3}", deficiency, simulated);
        }
        assert!(suggestion.contrast_ratio >= required);
    }

    #[test]
    fn test_simulation_can_be_disabled() {
        let classifier = IssueClassifier::default();
        let evaluator = ElementEvaluator::new(&classifier, &NoRules, false);
        let outcome = evaluator
            .evaluate(&ElementSnapshot::new("body", Rgb::BLACK, Rgb::WHITE))
            .unwrap();
        assert!(!outcome.has_issue_of(IssueKind::ColorBlindness));
    }

    #[test]
    fn test_rule_findings_become_issues() {
        let classifier = IssueClassifier::default();
        let evaluator = ElementEvaluator::new(&classifier, &AltTextRule, false);
        let outcome = evaluator
            .evaluate(&ElementSnapshot::new("img.logo", Rgb::BLACK, Rgb::WHITE))
            .unwrap();
        assert!(outcome.has_issue_of(IssueKind::RuleViolation));
        assert_eq!(outcome.issues[0].rule_id.as_deref(), Some("1.1.1"));
    }
}

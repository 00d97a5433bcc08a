//! Confidence-scored profile recommendations.
//!
//! Every profile starts from a baseline confidence. Each external signal the
//! profile addresses adds a fixed increment, and so does a good usage record.
//! The sum is clamped to `[0, 1]`. Profiles scoring under the threshold are
//! still computed and returned separately, so callers can inspect them.

use super::Profile;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_BASELINE_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MOTION_INCREMENT: f64 = 0.2;
pub const DEFAULT_CONTRAST_INCREMENT: f64 = 0.2;
pub const DEFAULT_LARGE_TEXT_INCREMENT: f64 = 0.1;
pub const DEFAULT_HISTORY_INCREMENT: f64 = 0.1;
pub const DEFAULT_SATISFACTION_THRESHOLD: f64 = 70.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Absorbs rounding when a sum of increments lands exactly on the threshold.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// System signals observed by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationContext {
    pub prefers_reduced_motion: bool,
    pub prefers_high_contrast: bool,
    pub prefers_larger_text: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationConfig {
    pub baseline: f64,
    pub motion_increment: f64,
    pub contrast_increment: f64,
    pub large_text_increment: f64,
    pub history_increment: f64,
    /// Satisfaction (0..=100) above which history counts in favor
    pub satisfaction_threshold: f64,
    /// Minimum confidence for a recommendation to be surfaced
    pub confidence_threshold: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_BASELINE_CONFIDENCE,
            motion_increment: DEFAULT_MOTION_INCREMENT,
            contrast_increment: DEFAULT_CONTRAST_INCREMENT,
            large_text_increment: DEFAULT_LARGE_TEXT_INCREMENT,
            history_increment: DEFAULT_HISTORY_INCREMENT,
            satisfaction_threshold: DEFAULT_SATISFACTION_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub profile_id: String,
    pub confidence: f64,
    pub reason: String,
    pub matched_features: Vec<String>,
}

/// Ranked output of one computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    /// At or above the confidence threshold, best first
    pub surfaced: Vec<Recommendation>,
    /// Computed but below the threshold, best first
    pub below_threshold: Vec<Recommendation>,
}

pub struct RecommendationEngine {
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(config: RecommendationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Score one profile against the context.
    pub fn score(&self, profile: &Profile, context: &RecommendationContext) -> Recommendation {
        let cfg = &self.config;
        let mut confidence = cfg.baseline;
        let mut features = Vec::new();
        let mut reasons = Vec::new();

        if context.prefers_reduced_motion && profile.wants_reduced_motion() {
            confidence += cfg.motion_increment;
            features.push("motion_reduction".to_string());
            reasons.push("system prefers reduced motion");
        }
        if context.prefers_high_contrast && profile.wants_high_contrast() {
            confidence += cfg.contrast_increment;
            features.push("color_contrast".to_string());
            reasons.push("system prefers high contrast");
        }
        if context.prefers_larger_text && profile.wants_larger_text() {
            confidence += cfg.large_text_increment;
            features.push("text_scaling".to_string());
            reasons.push("larger text requested");
        }

        // Cold start: no usage means no history term at all.
        let usage = &profile.usage;
        if usage.usage_count > 0 {
            if let Some(satisfaction) = usage.satisfaction_score {
                if satisfaction > cfg.satisfaction_threshold {
                    confidence += cfg.history_increment;
                    features.push("history".to_string());
                    reasons.push("rated well in past sessions");
                }
            }
        }

        let reason = if reasons.is_empty() {
            "no matching signals".to_string()
        } else {
            let mut reason = reasons.join("; ");
            if let Some(first) = reason.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            reason
        };

        Recommendation {
            profile_id: profile.id.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            reason,
            matched_features: features,
        }
    }

    /// Score and rank every candidate. Ties go to the most recently used.
    pub fn recommend<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a Profile>,
        context: &RecommendationContext,
    ) -> Recommendations {
        let mut scored: Vec<(&Profile, Recommendation)> = candidates
            .into_iter()
            .map(|profile| (profile, self.score(profile, context)))
            .collect();

        scored.sort_by(|(pa, ra), (pb, rb)| {
            rb.confidence
                .partial_cmp(&ra.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| pb.usage.last_used_at.cmp(&pa.usage.last_used_at))
                .then_with(|| pa.id.cmp(&pb.id))
        });

        let threshold = self.config.confidence_threshold - THRESHOLD_EPSILON;
        let (surfaced, below_threshold): (Vec<_>, Vec<_>) = scored
            .into_iter()
            .map(|(_, rec)| rec)
            .partition(|rec| rec.confidence >= threshold);

        Recommendations {
            surfaced,
            below_threshold,
        }
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new(RecommendationConfig::default())
    }
}

//! Accessibility profiles and profile recommendations.
//!
//! A profile is a named bundle of accessibility settings. Presets ship with
//! the crate and are read-only; user profiles are created, edited, merged and
//! exchanged through [`ProfileManager`]. [`RecommendationEngine`] ranks all
//! of them against current system signals and usage history.

pub mod manager;
pub mod presets;
pub mod recommend;

pub use manager::{ProfileManager, ProfileManagerConfig, StoredProfiles};
pub use recommend::{
    Recommendation, RecommendationConfig, RecommendationContext, RecommendationEngine,
    Recommendations,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Setting names the recommendation signals look at.
pub const TEXT_SCALING: &str = "text_scaling";
pub const COLOR_CONTRAST: &str = "color_contrast";
pub const MOTION_REDUCTION: &str = "motion_reduction";
pub const REDUCE_ANIMATIONS: &str = "reduce_animations";

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Number(f64),
    Choice(String),
}

impl SettingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Flag(b) => write!(f, "{}", b),
            SettingValue::Number(n) => write!(f, "{}", n),
            SettingValue::Choice(s) => write!(f, "{}", s),
        }
    }
}

pub type ProfileSettings = BTreeMap<String, SettingValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCategory {
    Visual,
    Audio,
    Motor,
    Cognitive,
    #[default]
    Custom,
}

/// Usage statistics, tracked for presets and user profiles alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileUsage {
    /// Number of activations; never decreases
    pub usage_count: u64,
    /// Running average of completed session lengths
    pub average_session_secs: f64,
    /// Smoothed satisfaction in `0..=100`, absent until the first sample
    pub satisfaction_score: Option<f64>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ProfileCategory,
    pub settings: ProfileSettings,
    #[serde(default)]
    pub is_preset: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub usage: ProfileUsage,
}

impl Profile {
    pub fn setting(&self, name: &str) -> Option<&SettingValue> {
        self.settings.get(name)
    }

    pub fn text_scaling(&self) -> Option<f64> {
        self.setting(TEXT_SCALING).and_then(SettingValue::as_f64)
    }

    /// True when the profile raises contrast above normal.
    pub fn wants_high_contrast(&self) -> bool {
        matches!(
            self.setting(COLOR_CONTRAST).and_then(SettingValue::as_str),
            Some("high") | Some("highest")
        )
    }

    /// True when the profile reduces motion in any form.
    pub fn wants_reduced_motion(&self) -> bool {
        let reduction = self
            .setting(MOTION_REDUCTION)
            .and_then(SettingValue::as_str)
            .map(|v| v != "none")
            .unwrap_or(false);
        let animations = self
            .setting(REDUCE_ANIMATIONS)
            .and_then(SettingValue::as_bool)
            .unwrap_or(false);
        reduction || animations
    }

    /// True when the profile scales text above 1.0.
    pub fn wants_larger_text(&self) -> bool {
        self.text_scaling().map(|s| s > 1.0).unwrap_or(false)
    }
}

/// Input for creating a user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ProfileCategory,
    #[serde(default)]
    pub settings: ProfileSettings,
}

/// Partial update of a user profile; `settings` entries are upserted.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: ProfileSettings,
}

/// How [`ProfileManager::merge`] combines source settings into a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Replace the target's settings entirely
    Override,
    /// Source values win, target-only settings are kept
    Merge,
    /// Copy only the named settings
    Selective(Vec<String>),
}

/// A self-describing, checksummed profile bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileExport {
    pub version: String,
    pub profile: Profile,
    pub exported_at: DateTime<Utc>,
    pub checksum: String,
}

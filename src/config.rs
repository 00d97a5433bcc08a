//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.contrastwatch.toml` files.

use crate::analysis::classifier::{DEFAULT_SUGGESTION_MAX_STEPS, DEFAULT_SUGGESTION_STEP};
use crate::analysis::ClassifierConfig;
use crate::ledger::trend::{DEFAULT_SIGNIFICANCE_THRESHOLD, DEFAULT_WINDOW_DAYS};
use crate::ledger::{TrendConfig, DEFAULT_HISTORY_CAP};
use crate::models::WcagLevel;
use crate::monitor::MonitorConfig;
use crate::profiles::manager::{DEFAULT_MAX_PROFILES, DEFAULT_SATISFACTION_WEIGHT};
use crate::profiles::recommend::{
    DEFAULT_BASELINE_CONFIDENCE, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CONTRAST_INCREMENT,
    DEFAULT_HISTORY_INCREMENT, DEFAULT_LARGE_TEXT_INCREMENT, DEFAULT_MOTION_INCREMENT,
    DEFAULT_SATISFACTION_THRESHOLD,
};
use crate::profiles::{ProfileManagerConfig, RecommendationConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".contrastwatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Contrast analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// History and trend settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Profile and recommendation settings.
    #[serde(default)]
    pub recommendations: RecommendationsConfig,

    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Quiet period after the last change before a pass runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How often `--watch` checks the snapshot file.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_output() -> String {
    "contrastwatch_report.md".to_string()
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Contrast analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Conformance level the thresholds are taken from (A, AA, AAA).
    #[serde(default)]
    pub wcag_level: WcagLevel,

    /// Also check passing pairs under simulated color vision deficiencies.
    #[serde(default = "default_true")]
    pub simulate_color_blindness: bool,

    /// Lightness change per step when searching for a compliant color.
    #[serde(default = "default_suggestion_step")]
    pub suggestion_step: f64,

    /// Maximum number of steps in that search.
    #[serde(default = "default_suggestion_max_steps")]
    pub suggestion_max_steps: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wcag_level: WcagLevel::default(),
            simulate_color_blindness: true,
            suggestion_step: default_suggestion_step(),
            suggestion_max_steps: default_suggestion_max_steps(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_suggestion_step() -> f64 {
    DEFAULT_SUGGESTION_STEP
}

fn default_suggestion_max_steps() -> u32 {
    DEFAULT_SUGGESTION_MAX_STEPS
}

/// History and trend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum run summaries kept.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Trend window in days.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Score delta (points) that counts as a significant change.
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            window_days: default_window_days(),
            significance_threshold: default_significance_threshold(),
        }
    }
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

fn default_significance_threshold() -> f64 {
    DEFAULT_SIGNIFICANCE_THRESHOLD
}

/// Profile and recommendation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsConfig {
    #[serde(default = "default_baseline_confidence")]
    pub baseline_confidence: f64,

    #[serde(default = "default_motion_increment")]
    pub motion_increment: f64,

    #[serde(default = "default_contrast_increment")]
    pub contrast_increment: f64,

    #[serde(default = "default_large_text_increment")]
    pub large_text_increment: f64,

    #[serde(default = "default_history_increment")]
    pub history_increment: f64,

    /// Satisfaction (0-100) above which past use counts in favor.
    #[serde(default = "default_satisfaction_threshold")]
    pub satisfaction_threshold: f64,

    /// Minimum confidence for a recommendation to be shown.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Weight of a new satisfaction sample in the moving average.
    #[serde(default = "default_satisfaction_weight")]
    pub satisfaction_weight: f64,

    /// Maximum user-defined profiles.
    #[serde(default = "default_max_profiles")]
    pub max_profiles: usize,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            baseline_confidence: default_baseline_confidence(),
            motion_increment: default_motion_increment(),
            contrast_increment: default_contrast_increment(),
            large_text_increment: default_large_text_increment(),
            history_increment: default_history_increment(),
            satisfaction_threshold: default_satisfaction_threshold(),
            confidence_threshold: default_confidence_threshold(),
            satisfaction_weight: default_satisfaction_weight(),
            max_profiles: default_max_profiles(),
        }
    }
}

fn default_baseline_confidence() -> f64 {
    DEFAULT_BASELINE_CONFIDENCE
}

fn default_motion_increment() -> f64 {
    DEFAULT_MOTION_INCREMENT
}

fn default_contrast_increment() -> f64 {
    DEFAULT_CONTRAST_INCREMENT
}

fn default_large_text_increment() -> f64 {
    DEFAULT_LARGE_TEXT_INCREMENT
}

fn default_history_increment() -> f64 {
    DEFAULT_HISTORY_INCREMENT
}

fn default_satisfaction_threshold() -> f64 {
    DEFAULT_SATISFACTION_THRESHOLD
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_satisfaction_weight() -> f64 {
    DEFAULT_SATISFACTION_WEIGHT
}

fn default_max_profiles() -> usize {
    DEFAULT_MAX_PROFILES
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted history and profiles.
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,

    /// Per-operation timeout in milliseconds.
    #[serde(default = "default_storage_timeout_ms")]
    pub timeout_ms: u64,

    /// Keep everything in memory for this session.
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
            timeout_ms: default_storage_timeout_ms(),
            in_memory: false,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".contrastwatch")
}

fn default_storage_timeout_ms() -> u64 {
    2000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(debounce) = args.debounce_ms {
            self.general.debounce_ms = debounce;
        }
        if let Some(interval) = args.poll_interval_ms {
            self.general.poll_interval_ms = interval;
        }

        if let Some(level) = args.level {
            self.analysis.wcag_level = level;
        }
        if args.no_color_blindness {
            self.analysis.simulate_color_blindness = false;
        }

        if let Some(ref dir) = args.store_dir {
            self.storage.directory = dir.clone();
        }
        if args.no_store {
            self.storage.in_memory = true;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Tunables for the monitoring core.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            classifier: ClassifierConfig {
                level: self.analysis.wcag_level,
                suggestion_step: self.analysis.suggestion_step,
                suggestion_max_steps: self.analysis.suggestion_max_steps,
            },
            simulate_color_blindness: self.analysis.simulate_color_blindness,
            history_cap: self.ledger.history_cap,
            trend: TrendConfig {
                window_days: self.ledger.window_days,
                significance_threshold: self.ledger.significance_threshold,
            },
            profiles: ProfileManagerConfig {
                max_profiles: self.recommendations.max_profiles,
                satisfaction_weight: self.recommendations.satisfaction_weight,
            },
            recommendations: RecommendationConfig {
                baseline: self.recommendations.baseline_confidence,
                motion_increment: self.recommendations.motion_increment,
                contrast_increment: self.recommendations.contrast_increment,
                large_text_increment: self.recommendations.large_text_increment,
                history_increment: self.recommendations.history_increment,
                satisfaction_threshold: self.recommendations.satisfaction_threshold,
                confidence_threshold: self.recommendations.confidence_threshold,
            },
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.general.debounce_ms)
    }

    /// Snapshot polling interval; a zero from the config file is raised to
    /// one millisecond since a timer cannot tick at zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms.max(1))
    }

    /// Log level for the session. `--quiet` wins over a verbose config.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.timeout_ms)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

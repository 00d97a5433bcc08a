//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Severity, WcagLevel};
use crate::profiles::RecommendationContext;
use clap::Parser;
use std::path::PathBuf;

/// ContrastWatch - continuous accessibility compliance monitor
///
/// Evaluates element color pairs against WCAG contrast thresholds, keeps a
/// compliance history with trends, and recommends accessibility profiles.
///
/// Examples:
///   contrastwatch --snapshot page.json
///   contrastwatch --snapshot page.json --level AAA --format json
///   contrastwatch --snapshot page.json --watch
///   contrastwatch --snapshot page.json --fail-on critical
///   contrastwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON snapshot of the surface's elements
    ///
    /// A JSON object with an `elements` list.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CONTRASTWATCH_SNAPSHOT",
        required_unless_present = "init_config"
    )]
    pub snapshot: Option<PathBuf>,

    /// WCAG conformance level (A, AA, AAA)
    #[arg(short, long, value_name = "LEVEL", env = "CONTRASTWATCH_LEVEL")]
    pub level: Option<WcagLevel>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .contrastwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for persisted history and profiles
    #[arg(long, value_name = "DIR", env = "CONTRASTWATCH_STORE")]
    pub store_dir: Option<PathBuf>,

    /// Keep history and profiles in memory only
    #[arg(long, conflicts_with = "store_dir")]
    pub no_store: bool,

    /// Keep running and re-analyze whenever the snapshot file changes
    #[arg(short, long)]
    pub watch: bool,

    /// Snapshot file polling interval for --watch, in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Quiet period after a change before a pass runs, in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Skip color-blindness simulation
    #[arg(long)]
    pub no_color_blindness: bool,

    /// The system prefers high contrast
    #[arg(long)]
    pub prefers_high_contrast: bool,

    /// The system prefers reduced motion
    #[arg(long)]
    pub prefers_reduced_motion: bool,

    /// The system prefers larger text
    #[arg(long)]
    pub prefers_larger_text: bool,

    /// Activate this accessibility profile before analyzing
    #[arg(long, value_name = "ID")]
    pub profile: Option<String>,

    /// Number of past runs shown in the report
    #[arg(long, default_value = "10", value_name = "COUNT")]
    pub history: usize,

    /// Fail if issues at or above this severity are found
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is exceeded.
    /// Values: critical, warning, info
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .contrastwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Severity level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Info,
    Warning,
    Critical,
}

impl FailOnLevel {
    pub fn severity(self) -> Severity {
        match self {
            FailOnLevel::Info => Severity::Info,
            FailOnLevel::Warning => Severity::Warning,
            FailOnLevel::Critical => Severity::Critical,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.snapshot {
            None => return Err("A snapshot file is required (--snapshot)".to_string()),
            Some(ref path) if !path.is_file() => {
                return Err(format!("Snapshot file does not exist: {}", path.display()));
            }
            Some(_) => {}
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.poll_interval_ms == Some(0) {
            return Err("Poll interval must be at least 1 millisecond".to_string());
        }

        if self.history == 0 {
            return Err("History must show at least 1 run".to_string());
        }

        Ok(())
    }

    /// System preference signals for profile recommendations.
    pub fn recommendation_context(&self) -> RecommendationContext {
        RecommendationContext {
            prefers_reduced_motion: self.prefers_reduced_motion,
            prefers_high_contrast: self.prefers_high_contrast,
            prefers_larger_text: self.prefers_larger_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_args() -> Args {
        Args {
            snapshot: Some(PathBuf::from("Cargo.toml")),
            level: None,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            store_dir: None,
            no_store: false,
            watch: false,
            poll_interval_ms: None,
            debounce_ms: None,
            no_color_blindness: false,
            prefers_high_contrast: false,
            prefers_reduced_motion: false,
            prefers_larger_text: false,
            profile: None,
            history: 10,
            fail_on: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "contrastwatch",
            "--snapshot",
            "page.json",
            "--level",
            "aaa",
            "--format",
            "json",
            "--fail-on",
            "warning",
            "--prefers-high-contrast",
        ])
        .unwrap();

        assert_eq!(args.level, Some(WcagLevel::AAA));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.fail_on, Some(FailOnLevel::Warning));
        assert!(args.recommendation_context().prefers_high_contrast);
        assert!(!args.recommendation_context().prefers_reduced_motion);
    }

    #[test]
    fn test_validation_missing_snapshot_file() {
        let mut args = make_args();
        args.snapshot = Some(PathBuf::from("does/not/exist.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        assert!(args.validate().is_ok());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.snapshot = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_fail_on_severity() {
        assert_eq!(FailOnLevel::Critical.severity(), Severity::Critical);
        assert!(FailOnLevel::Info.severity() < FailOnLevel::Warning.severity());
    }

    #[test]
    fn test_log_level() {
        let level = |args: &Args, verbose_config: bool| {
            let mut config = Config::default();
            config.general.verbose = verbose_config;
            config.merge_with_args(args);
            config.log_level(args.quiet)
        };

        let mut args = make_args();
        assert_eq!(level(&args, false), tracing::Level::INFO);
        assert_eq!(level(&args, true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(level(&args, false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(level(&args, true), tracing::Level::ERROR);
    }
}

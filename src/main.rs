//! ContrastWatch - continuous accessibility compliance monitor
//!
//! A CLI that evaluates a surface snapshot against WCAG contrast rules,
//! records the result in a persistent compliance history and renders a
//! report with trends and profile recommendations.
//!
//! Exit codes:
//!   0 - Success (no issues above threshold, or no --fail-on set)
//!   1 - Runtime error (config, unreadable snapshot, etc.)
//!   2 - Issues found at or above --fail-on threshold

use anyhow::{bail, Context, Result};
use contrastwatch::cli::{Args, OutputFormat};
use contrastwatch::config::{Config, CONFIG_FILE};
use contrastwatch::models::PassReport;
use contrastwatch::monitor::ComplianceMonitor;
use contrastwatch::provider::{ChangeNotice, FileProvider};
use contrastwatch::report;
use contrastwatch::scheduler::{AnalysisScheduler, SchedulerHandle};
use contrastwatch::storage::{FileStore, Persistence};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first so its verbose setting can pick the log level
    let (mut config, config_warning) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(args.quiet))?;

    info!("ContrastWatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    if let Some(warning) = config_warning {
        warn!("{}", warning);
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Monitoring failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .contrastwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize thresholds, history, recommendations, and storage.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run one pass, and keep monitoring with --watch. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let snapshot = args
        .snapshot
        .clone()
        .context("No snapshot file given")?;

    println!("🔍 Snapshot: {}", snapshot.display());
    println!("   WCAG level: {}", config.analysis.wcag_level);
    if config.storage.in_memory {
        println!("   Storage: in memory");
    } else {
        println!("   Storage: {}", config.storage.directory.display());
    }

    let mut monitor = ComplianceMonitor::new(
        config.monitor_config(),
        Arc::new(FileProvider::new(&snapshot)),
        open_storage(&config),
    );
    monitor.load().await;
    if monitor.is_storage_degraded() {
        warn!("Storage unavailable; this session's history will not be saved");
    }

    let scheduler = AnalysisScheduler::spawn(monitor, config.debounce());

    if let Some(ref id) = args.profile {
        let profile = scheduler
            .activate_profile(id.clone())
            .await
            .with_context(|| format!("Failed to activate profile {}", id))?;
        println!("   Profile: {} ({})", profile.name, profile.id);
    }

    println!("\n🔬 Running contrast analysis...");
    let spinner = start_spinner(args.quiet);
    let first = scheduler.run_full_pass().await;
    spinner.finish_and_clear();
    let first = first.context("Scheduler stopped before the first pass")?;

    if first.failed && !args.watch {
        scheduler.shutdown().await.ok();
        bail!(
            "Analysis failed: {}",
            first.failure.as_deref().unwrap_or("unknown error")
        );
    }

    let mut exit_code = emit_report(&scheduler, &first, &args, &config).await?;

    if args.watch {
        exit_code = watch(&scheduler, &snapshot, &first, exit_code, &args, &config).await?;
    }

    scheduler
        .shutdown()
        .await
        .context("Scheduler stopped unexpectedly")?;

    println!(
        "\n✅ Done in {:.1}s. Report saved to: {}",
        start_time.elapsed().as_secs_f64(),
        config.general.output
    );

    Ok(exit_code)
}

fn open_storage(config: &Config) -> Persistence {
    if config.storage.in_memory {
        Persistence::in_memory()
    } else {
        Persistence::new(
            Arc::new(FileStore::new(&config.storage.directory)),
            config.storage_timeout(),
        )
    }
}

fn start_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Evaluating elements...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Render and write the report for `pass`, print a summary, and return
/// the exit code the pass warrants.
async fn emit_report(
    scheduler: &SchedulerHandle,
    pass: &PassReport,
    args: &Args,
    config: &Config,
) -> Result<i32> {
    let mut document = scheduler
        .document(args.recommendation_context())
        .await?
        .context("No completed pass to report on")?;
    document.history = scheduler.history(args.history).await?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&document)?,
        OutputFormat::Markdown => report::generate_markdown_report(&document),
    };
    report::write_report(&output, Path::new(&config.general.output))?;

    if pass.failed {
        println!(
            "\n⚠️  Pass failed: {}",
            pass.failure.as_deref().unwrap_or("unknown error")
        );
        return Ok(1);
    }

    let summary = &pass.summary;
    println!("\n📊 Compliance Summary:");
    println!(
        "   Score: {:.1} ({})   Elements: {}",
        pass.overall_score, pass.grade, pass.metadata.elements_evaluated
    );
    println!("   Total findings: {}", summary.total);
    println!(
        "   - 🔴 Critical: {} | 🟡 Warning: {} | 🔵 Info: {}",
        summary.critical, summary.warning, summary.info
    );
    if !pass.skipped.is_empty() {
        println!("   Skipped elements: {}", pass.skipped.len());
    }
    if let Some(change) = document.trend.latest_change() {
        println!(
            "   Last significant change: {:+.1} points at {}",
            change.score_diff,
            change.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
    for rec in &document.recommendations.surfaced {
        println!(
            "   💡 Profile {} ({:.0}%): {}",
            rec.profile_id,
            rec.confidence * 100.0,
            rec.reason
        );
    }

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        let threshold = fail_level.severity();
        if pass.all_issues().any(|i| i.severity >= threshold) {
            eprintln!(
                "\n⛔ Issues found at or above {:?} severity. Failing (exit code 2).",
                fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Poll the snapshot file and feed changes to the scheduler until Ctrl+C.
/// Returns the exit code of the last reported pass.
async fn watch(
    scheduler: &SchedulerHandle,
    snapshot: &Path,
    first: &PassReport,
    mut exit_code: i32,
    args: &Args,
    config: &Config,
) -> Result<i32> {
    println!(
        "\n👀 Watching {} for changes (Ctrl+C to stop)...",
        snapshot.display()
    );

    let mut last_modified = modified_time(snapshot);
    let mut last_reported = first.metadata.timestamp;
    let mut ticker = tokio::time::interval(config.poll_interval());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n🛑 Stopping...");
                break;
            }
            _ = ticker.tick() => {
                let modified = modified_time(snapshot);
                if modified != last_modified {
                    last_modified = modified;
                    debug!("Snapshot file changed");
                    scheduler.notify(ChangeNotice::Bulk).await?;
                }

                if let Some(latest) = scheduler.latest_report().await? {
                    if latest.metadata.timestamp != last_reported {
                        last_reported = latest.metadata.timestamp;
                        exit_code = emit_report(scheduler, &latest, args, config).await?;
                    }
                }
            }
        }
    }

    Ok(exit_code)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Load configuration from file or use defaults. Runs before logging is
/// set up, so a fallback to defaults is returned as a warning to log later.
fn load_config(args: &Args) -> Result<(Config, Option<String>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, None));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, None)),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => Ok((
            Config::default(),
            Some(format!("Failed to load {}: {:#}", CONFIG_FILE, e)),
        )),
    }
}

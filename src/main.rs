//! AuditMatrix - batch network-device configuration audits
//!
//! A CLI tool that feeds device configuration files through an external
//! configuration scanner and merges every report's recommendations into a
//! single issue-by-host spreadsheet.
//!
//! Exit codes:
//!   0 - Success (including runs with nothing to export)
//!   1 - Configuration, discovery, staging or export failure

mod analysis;
mod cli;
mod config;
mod error;
mod extract;
mod identity;
mod invoker;
mod models;
mod pipeline;
mod progress;
mod report;
mod selector;
mod staging;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use invoker::ExternalScanner;
use pipeline::{Pipeline, RunSummary};
use selector::SourceSelector;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

fn main() -> Result<()> {
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

    let started_at = Local::now();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_file = match init_logging(&args, config.paths.log_dir.as_deref(), &started_at) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("=== AuditMatrix v{} started ===", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = log_file {
        info!("Logging to {}", path.display());
    }
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    let exit_code = match run(&args, &config, started_at) {
        Ok(code) => code,
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            1
        }
    };

    info!("=== AuditMatrix finished ===");
    std::process::exit(exit_code);
}

/// Handle --init-config: generate a default .auditmatrix.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the source share, scanner path and device type.");
    Ok(())
}

/// Initialize console logging plus an optional plain-text log file.
fn init_logging(
    args: &Args,
    log_dir: Option<&Path>,
    started_at: &DateTime<Local>,
) -> Result<Option<PathBuf>> {
    // RUST_LOG overrides the verbosity flags on the console
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string()));

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(console_filter);

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(format!(
                "auditmatrix_log_{}.txt",
                started_at.format("%Y%m%d_%H%M%S")
            ));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(if args.verbose {
                    LevelFilter::DEBUG
                } else {
                    LevelFilter::INFO
                });
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(log_path)
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?.unwrap_or_default()
    };

    config.merge_with_args(args)?;
    Ok(config)
}

/// Run the selected mode. Returns the process exit code.
fn run(args: &Args, config: &Config, started_at: DateTime<Local>) -> Result<i32> {
    let start_time = Instant::now();
    let show_progress = !args.quiet;

    if args.dry_run {
        return handle_dry_run(config);
    }

    let scanner = ExternalScanner::from(&config.scanner);
    let pipeline = Pipeline::new(config, &scanner).with_progress(show_progress);

    let summary = if let Some(ref reports_dir) = args.from_reports {
        println!("📂 Aggregating existing reports in {}", reports_dir.display());
        pipeline.run_from_reports(reports_dir, started_at)?
    } else {
        println!(
            "📥 Selecting configs ({}) under {}",
            config.selection.policy,
            config
                .paths
                .source_dir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        pipeline.run(started_at)?
    };

    print_summary(&summary, start_time.elapsed().as_secs_f64());
    Ok(0)
}

/// Handle --dry-run: run the selection policy, print the result, exit.
fn handle_dry_run(config: &Config) -> Result<i32> {
    config.validate()?;
    let source_dir = config
        .paths
        .source_dir
        .clone()
        .context("paths.source_dir is not set")?;

    println!(
        "\n🔍 Dry run: selecting configs ({}) under {}\n",
        config.selection.policy,
        source_dir.display()
    );

    let selector = SourceSelector::from_config(source_dir, &config.selection);
    let files = selector.select(config.selection.policy);

    if files.is_empty() {
        println!("   No matching config files found.");
    } else {
        println!("   Found {} files that would be processed:\n", files.len());
        for file in &files {
            println!(
                "     📄 {} -> {}",
                file.path.display(),
                identity::extract_identity(
                    &file
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                )
            );
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete. The scanner was not run.");
    Ok(0)
}

fn print_summary(summary: &RunSummary, duration: f64) {
    println!("\n📊 Run Summary:");
    if summary.selected > 0 {
        println!(
            "   Configs selected: {} | devices: {}",
            summary.selected, summary.devices
        );
        println!(
            "   Scanner: {} report(s), {} skipped",
            summary.scanned, summary.skipped
        );
    }
    println!("   Reports parsed: {}", summary.reports);
    println!(
        "   Hosts with findings: {} | distinct issues: {}",
        summary.hosts, summary.issues
    );
    println!("   Duration: {:.1}s", duration);

    if let Some(ref workspace) = summary.workspace {
        println!("   Workspace kept at: {}", workspace.display());
    }

    match summary.output {
        Some(ref path) => println!("\n✅ Summary saved to: {}", path.display()),
        None => println!("\nℹ️  No data for the report, nothing exported."),
    }
}

//! # Strata CLI - Incremental directory backups
//!
//! Command-line front end for the Strata journal engine.
//!
//! ## Usage
//! ```bash
//! # Back up ./project into ./backups every 60 seconds
//! strata watch --watch ./project --backup ./backups
//!
//! # Scan every 10 seconds, skipping build output
//! strata watch --watch ./project --backup ./backups --refresh 10 --ignore 'target/**'
//!
//! # Rebuild the latest state into ./restored
//! strata restore --backup ./backups --restore ./restored
//!
//! # Rebuild the state as of a point in time
//! strata restore --backup ./backups --restore ./restored --until 2024-01-01T00:00:00Z
//!
//! # Inspect the journal
//! strata list --backup ./backups
//! ```

use chrono::DateTime;
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};
use strata::{
    ConfigFile, JournalReader, RestoreOptions, StrataError, WatchConfig, Watcher,
};
use tracing_subscriber::EnvFilter;

/// Strata CLI - Incremental, chunked backups with point-in-time restore
#[derive(Parser)]
#[command(name = "strata")]
#[command(version)]
#[command(about = "Back up a directory tree into a replayable journal and restore it")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file (interval, ignore patterns, segment sizing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and journal its changes periodically
    #[command(alias = "w")]
    Watch {
        /// Directory to back up
        #[arg(short, long)]
        watch: PathBuf,

        /// Backup location
        #[arg(short, long)]
        backup: PathBuf,

        /// Seconds between scans [default: 60]
        #[arg(short, long)]
        refresh: Option<u64>,

        /// Glob patterns to skip (repeatable)
        #[arg(short, long)]
        ignore: Vec<String>,
    },

    /// Rebuild a directory from the journal
    #[command(alias = "rs")]
    Restore {
        /// Directory to restore into
        #[arg(short, long)]
        restore: PathBuf,

        /// Backup location
        #[arg(short, long)]
        backup: PathBuf,

        /// Restore the state as of this time (epoch seconds or RFC 3339)
        #[arg(short, long, value_parser = parse_until)]
        until: Option<u64>,

        /// Show progress
        #[arg(long)]
        progress: bool,
    },

    /// List the segments of a journal
    #[command(alias = "ls")]
    List {
        /// Backup location
        #[arg(short, long)]
        backup: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    // Run command
    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<StrataError>() {
            Some(strata_error) => strata_error.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> anyhow::Result<()> {
    let config_file = match &cli.config {
        Some(path) => ConfigFile::load(path).map_err(|e| {
            StrataError::config(format!("cannot load config file {}: {}", path.display(), e))
        })?,
        None => ConfigFile::default(),
    };

    match cli.command {
        Commands::Watch {
            watch,
            backup,
            refresh,
            ignore,
        } => cmd_watch(watch, backup, refresh, ignore, &config_file),
        Commands::Restore {
            restore,
            backup,
            until,
            progress,
        } => cmd_restore(backup, restore, until, progress),
        Commands::List { backup } => cmd_list(backup),
    }
}

/// Accept epoch seconds or an RFC 3339 timestamp
fn parse_until(value: &str) -> Result<u64, String> {
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }
    let time = humantime::parse_rfc3339_weak(value)
        .map_err(|e| format!("expected epoch seconds or RFC 3339 time: {}", e))?;
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| "time is before the Unix epoch".to_string())
}

fn cmd_watch(
    watch_root: PathBuf,
    backup_root: PathBuf,
    refresh: Option<u64>,
    ignore: Vec<String>,
    config_file: &ConfigFile,
) -> anyhow::Result<()> {
    let mut config = WatchConfig::new(watch_root, backup_root)
        .with_ignore_patterns(ignore)
        .merge_file(config_file);
    if let Some(secs) = refresh {
        config = config.with_interval(Duration::from_secs(secs));
    }

    let mut watcher = Watcher::new(config)?;

    println!(
        "{} {} {} {}",
        "Watching".blue().bold(),
        watcher.config().watch_root.display().to_string().cyan(),
        "→".dimmed(),
        watcher.config().backup_root.display().to_string().cyan()
    );
    println!(
        "  Interval: {}",
        format_duration(watcher.config().interval).to_string().cyan()
    );
    if !watcher.config().ignore_patterns.is_empty() {
        println!(
            "  Ignoring: {}",
            watcher.config().ignore_patterns.join(", ").dimmed()
        );
    }

    watcher.run()
}

fn cmd_restore(
    backup_root: PathBuf,
    restore_root: PathBuf,
    until: Option<u64>,
    show_progress: bool,
) -> anyhow::Result<()> {
    let options = RestoreOptions { until };

    match until.and_then(format_epoch) {
        Some(when) => println!(
            "{} {} {}",
            "Restoring state as of".blue().bold(),
            when.yellow(),
            format!("into {}", restore_root.display()).dimmed()
        ),
        None => println!(
            "{} {}",
            "Restoring latest state into".blue().bold(),
            restore_root.display().to_string().yellow()
        ),
    }

    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Replaying journal...");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let result = strata::restore_with_options(&backup_root, &restore_root, &options);

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let report = result?;

    println!("{} Restoration complete", "✓".green().bold());
    println!("  Files restored: {}", report.files_restored.to_string().cyan());
    println!("  Deleted paths skipped: {}", report.tombstoned.to_string().yellow());
    println!("  Segments applied: {}", report.segments_applied.to_string().cyan());
    println!("  Bytes written: {}", format_bytes(report.bytes_written).cyan());
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(report.duration_ms)).to_string().cyan()
    );

    if !report.corrupt_segments.is_empty() {
        println!("\n{}", "Corrupt segments skipped:".red().bold());
        for corrupt in &report.corrupt_segments {
            println!("  - {}: {}", corrupt.name.red(), corrupt.reason);
        }
    }

    if !report.skipped_records.is_empty() {
        println!("\n{}", "Unsafe paths refused:".yellow().bold());
        for path in &report.skipped_records {
            println!("  - {}", path.yellow());
        }
    }

    if !report.warnings.is_empty() {
        println!("\n{}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            println!("  - {}", warning.yellow());
        }
    }

    Ok(())
}

fn cmd_list(backup_root: PathBuf) -> anyhow::Result<()> {
    let reader = JournalReader::new(&backup_root);
    let listing = reader.scan()?;

    if listing.is_empty() {
        println!("{}", "No backup chunks found.".yellow());
        return Ok(());
    }

    println!("{}", "Segments:".blue().bold());
    println!();

    let mut total_size = 0u64;
    for info in &listing.segments {
        let when = format_epoch(info.id.timestamp).unwrap_or_else(|| info.id.timestamp.to_string());
        println!(
            "  {} {} {}",
            info.id.file_name().yellow().bold(),
            when.dimmed(),
            format_bytes(info.size).cyan()
        );
        total_size += info.size;
    }

    for name in &listing.malformed {
        println!("  {} {}", name.red(), "(unrecognized name)".dimmed());
    }

    println!(
        "\n{}",
        format!(
            "{} segment(s), {}",
            listing.segments.len(),
            format_bytes(total_size)
        )
        .dimmed()
    );
    Ok(())
}

fn format_epoch(secs: u64) -> Option<String> {
    let secs = i64::try_from(secs).ok()?;
    DateTime::from_timestamp(secs, 0).map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

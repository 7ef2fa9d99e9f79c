//! location-analyzer - catalog location analysis stage
//!
//! A CLI host for the location processor: every location is gated by type,
//! enablement and allow-list, eligible ones are analyzed over HTTP, and the
//! outcomes are written as a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad config, unreadable locations file, etc.)
//!   2 - At least one location failed and --fail-on-error was set

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use location_analyzer::cli::{self, Args, OutputFormat};
use location_analyzer::config::{Config, DEFAULT_CONFIG_FILE};
use location_analyzer::models::{
    LocationEntry, LocationSpec, ProcessingEvent, RunMetadata, RunReport,
};
use location_analyzer::processor::LocationProcessor;
use location_analyzer::{module, report};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("location-analyzer v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the allow-list, timeouts and integrations.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the whole workflow. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let locations = collect_locations(&args)?;
    info!("Collected {} location(s)", locations.len());

    let processor = module::build_processor(Arc::new(config))?;
    let concurrency = processor.config().general.concurrency.max(1);

    if !args.quiet {
        println!("🔎 {}", processor.processor_name());
        println!("   Locations: {}", locations.len());
        if args.dry_run {
            println!("   Mode: dry run (no analysis)");
        } else {
            println!("   Concurrency: {}", concurrency);
            println!(
                "   Timeout: {}",
                match processor.config().processor.analysis_timeout_seconds {
                    0 => "disabled".to_string(),
                    secs => format!("{}s", secs),
                }
            );
        }
    }

    let entries = if args.dry_run {
        evaluate_gates(&processor, locations)
    } else {
        process_locations(&processor, locations, concurrency, !args.quiet).await
    };

    let metadata = RunMetadata {
        processor: processor.processor_name().to_string(),
        generated_at: Utc::now(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
        dry_run: args.dry_run,
        allow_list_active: processor.config().processor.allowed_targets().is_some(),
    };
    let report = RunReport::new(metadata, entries);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&processor.config().general.output));
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    let summary = &report.summary;
    if !args.quiet {
        println!("\n📊 Summary:");
        if args.dry_run {
            println!(
                "   Eligible: {} | Skipped: {} | Total: {}",
                summary.eligible, summary.skipped, summary.total
            );
        } else {
            println!(
                "   ✅ Handled: {} | ⏭️  Skipped: {} | ❌ Failed: {} | Total: {}",
                summary.handled, summary.skipped, summary.failed, summary.total
            );
            println!("   Findings: {}", summary.findings);
        }
        println!("   Duration: {:.1}s", report.metadata.duration_seconds);
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    if args.fail_on_error && summary.failed > 0 {
        eprintln!(
            "\n⛔ {} location(s) failed analysis. Failing (exit code 2).",
            summary.failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    load_config_from(args, Path::new(DEFAULT_CONFIG_FILE))
}

/// A config file that is present but unreadable aborts the run: falling back
/// to defaults would drop its `enabled` flag and allow-list.
fn load_config_from(args: &Args, default_path: &Path) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_optional(default_path)? {
        Some(config) => {
            info!("Loaded default config from {}", default_path.display());
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Gather locations from the command line and the locations file, in order.
fn collect_locations(args: &Args) -> Result<Vec<LocationSpec>> {
    let mut raw = args.locations.clone();

    if let Some(ref path) = args.locations_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read locations file {}", path.display()))?;
        raw.extend(cli::parse_location_list(&content));
    }

    raw.iter()
        .map(|r| {
            r.parse::<LocationSpec>()
                .with_context(|| format!("Invalid location '{}'", r))
        })
        .collect()
}

/// Dry run: evaluate the gates only.
fn evaluate_gates(processor: &LocationProcessor, locations: Vec<LocationSpec>) -> Vec<LocationEntry> {
    locations
        .into_iter()
        .map(|location| {
            let decision = processor.check_gates(&location);
            LocationEntry::from_gate(location, decision)
        })
        .collect()
}

/// Process every location with bounded concurrency, keeping input order.
async fn process_locations(
    processor: &LocationProcessor,
    locations: Vec<LocationSpec>,
    concurrency: usize,
    show_progress: bool,
) -> Vec<LocationEntry> {
    let progress = if show_progress {
        let pb = ProgressBar::new(locations.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut entries: Vec<(usize, LocationEntry)> = stream::iter(locations.into_iter().enumerate())
        .map(|(index, location)| {
            let progress = progress.clone();
            async move {
                let mut events: Vec<ProcessingEvent> = Vec::new();
                let outcome = processor.process(&location, &mut events).await;
                debug!("{} -> {}", location, outcome.label());
                progress.inc(1);
                (index, LocationEntry::from_outcome(location, &outcome, &events))
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    progress.finish_and_clear();

    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clap::Parser;
    use location_analyzer::analyzer::{AnalysisError, AnalyzerContext, LocationAnalyzer};
    use location_analyzer::integrations::IntegrationRegistry;
    use location_analyzer::models::{AnalysisResult, SkipReason};
    use location_analyzer::processor::ProcessorOptions;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps for the milliseconds named by the target's last path segment.
    struct DelayedAnalyzer;

    #[async_trait]
    impl LocationAnalyzer for DelayedAnalyzer {
        async fn analyze(&self, target: &str) -> Result<AnalysisResult, AnalysisError> {
            let delay: u64 = target
                .rsplit('/')
                .next()
                .and_then(|segment| segment.parse().ok())
                .ok_or_else(|| AnalysisError::Internal(format!("no delay in {}", target)))?;

            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(AnalysisResult::new(delay, format!("waited {}ms", delay)))
        }
    }

    fn processor_with(config: Config, created: Arc<AtomicUsize>) -> LocationProcessor {
        let factory = move |_: &AnalyzerContext| -> Box<dyn LocationAnalyzer> {
            created.fetch_add(1, Ordering::SeqCst);
            Box::new(DelayedAnalyzer)
        };

        LocationProcessor::new(ProcessorOptions {
            config: Arc::new(config),
            integrations: Arc::new(IntegrationRegistry::new()),
            analyzer_factory: Arc::new(factory),
        })
    }

    fn make_args() -> Args {
        let mut args = Args::try_parse_from(["location-analyzer", "url:https://example.com/x"]).unwrap();
        args.config = None;
        args
    }

    #[tokio::test]
    async fn test_process_locations_keeps_input_order() {
        let mut config = Config::default();
        config.processor.analysis_timeout_seconds = 0;
        let created = Arc::new(AtomicUsize::new(0));
        let processor = processor_with(config, Arc::clone(&created));

        let locations = vec![
            LocationSpec::url("https://a.com/120"),
            LocationSpec::new("file", "./catalog-info.yaml"),
            LocationSpec::url("https://b.com/0"),
            LocationSpec::url("https://c.com/not-a-delay"),
            LocationSpec::url("https://d.com/40"),
        ];

        let entries = process_locations(&processor, locations.clone(), 4, false).await;

        let order: Vec<LocationSpec> = entries.iter().map(|e| e.location.clone()).collect();
        assert_eq!(order, locations);

        let statuses: Vec<&str> = entries.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, ["handled", "skipped", "handled", "failed", "handled"]);

        assert_eq!(entries[0].result.as_ref().map(|r| r.count), Some(120));
        assert_eq!(entries[1].skip_reason, Some(SkipReason::UnsupportedType));
        assert_eq!(entries[0].events_emitted, 1);
        assert_eq!(entries[3].events_emitted, 1);
        assert_eq!(created.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_dry_run_never_analyzes() {
        let mut config = Config::default();
        config.processor.allowed_location_targets = Some(vec!["https://allowed.com/**".to_string()]);
        let created = Arc::new(AtomicUsize::new(0));
        let processor = processor_with(config, Arc::clone(&created));

        let entries = evaluate_gates(
            &processor,
            vec![
                LocationSpec::url("https://allowed.com/a/0"),
                LocationSpec::url("https://blocked.com/0"),
                LocationSpec::new("file", "./catalog-info.yaml"),
            ],
        );

        let statuses: Vec<&str> = entries.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, ["eligible", "skipped", "skipped"]);
        assert_eq!(entries[0].skip_reason, None);
        assert_eq!(entries[1].skip_reason, Some(SkipReason::NotAllowed));
        assert_eq!(entries[2].skip_reason, Some(SkipReason::UnsupportedType));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_default_config_aborts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[processor]\nenabled = false\nallowed_location_targets = [\"https://allowed.com/**\""
        )
        .unwrap();

        assert!(load_config_from(&make_args(), file.path()).is_err());
    }

    #[test]
    fn test_default_config_policy_is_kept() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[processor]\nenabled = false").unwrap();

        let config = load_config_from(&make_args(), file.path()).unwrap();
        assert!(!config.processor.is_enabled());
    }

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let config = load_config_from(&make_args(), &path).unwrap();
        assert!(config.processor.is_enabled());
        assert!(config.processor.allowed_targets().is_none());
    }
}

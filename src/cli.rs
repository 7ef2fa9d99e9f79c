//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// location-analyzer - run the location analysis stage over a set of locations
///
/// Each location is gated by type, enablement and allow-list, then analyzed.
/// Results are written as a Markdown or JSON report.
///
/// Examples:
///   location-analyzer https://github.com/acme/repo/blob/main/catalog-info.yaml
///   location-analyzer url:https://example.com/a.yaml file:./local.yaml
///   location-analyzer -f locations.txt --allow "https://github.com/acme/**"
///   location-analyzer -f locations.txt --dry-run --format json
///   location-analyzer --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Locations to process, as `type:target` or a bare http(s) URL
    #[arg(value_name = "LOCATION")]
    pub locations: Vec<String>,

    /// File with one location per line (`#` starts a comment)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub locations_file: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .location-analyzer.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "LOCATION_ANALYZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output file path for the report (default: from config)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Number of locations processed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Analysis timeout per location in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Allow-list patterns (comma-separated), replacing the configured list
    ///
    /// Example: --allow "https://github.com/acme/**,https://gitlab.com/acme/*"
    #[arg(long, value_name = "PATTERNS", value_delimiter = ',')]
    pub allow: Option<Vec<String>>,

    /// Emit a derived entity for locations with findings
    #[arg(long)]
    pub emit_entities: bool,

    /// Evaluate the gates only, without analyzing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when any location failed analysis
    #[arg(long)]
    pub fail_on_error: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .location-analyzer.toml configuration file
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

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.locations.is_empty() && self.locations_file.is_none() {
            return Err("No locations given; pass LOCATION arguments or --locations-file".to_string());
        }

        if let Some(ref path) = self.locations_file {
            if !path.is_file() {
                return Err(format!("Locations file does not exist: {}", path.display()));
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref allow) = self.allow {
            if allow.iter().all(|p| p.trim().is_empty()) {
                return Err("--allow needs at least one non-empty pattern".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Split a locations file into location references.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_location_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

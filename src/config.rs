//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.location-analyzer.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".location-analyzer.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Location processor policy.
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// HTTP client settings used by the analyzer.
    #[serde(default)]
    pub http: HttpConfig,

    /// Source-control integrations, one per host.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrations: Vec<IntegrationConfig>,
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

    /// Number of locations processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "location_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Location processor policy.
///
/// `enabled` and `allowed_location_targets` are optional on purpose: an
/// absent value means "enabled" and "allow everything" respectively, while a
/// present empty allow-list admits nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Feature flag for the stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Glob patterns a target must match to be analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_location_targets: Option<Vec<String>>,

    /// Upper bound for one analyzer call, in seconds. Zero disables it.
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_seconds: u64,

    /// Emit a derived `Location` entity when an analysis has findings.
    #[serde(default)]
    pub emit_derived_entities: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            allowed_location_targets: None,
            analysis_timeout_seconds: default_analysis_timeout(),
            emit_derived_entities: false,
        }
    }
}

impl ProcessorConfig {
    /// Whether the stage should run. Absent means enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }

    pub fn allowed_targets(&self) -> Option<&[String]> {
        self.allowed_location_targets.as_deref()
    }
}

fn default_analysis_timeout() -> u64 {
    60
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("location-analyzer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> u64 {
    10
}

/// A single source-control integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Host name the integration applies to (e.g. `github.com`).
    pub host: String,

    /// Provider flavor. Inferred from the host when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Access token, inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Name of an environment variable holding the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
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
        Self::load_optional(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load `path` if it exists.
    ///
    /// A file that exists but can't be parsed is an error, never a silent
    /// fallback to defaults.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if let Some(timeout) = args.timeout {
            self.processor.analysis_timeout_seconds = timeout;
        }

        // `--allow "a, b"` splits into "a" and " b".
        if let Some(ref allow) = args.allow {
            self.processor.allowed_location_targets =
                Some(allow.iter().map(|p| p.trim().to_string()).collect());
        }

        if args.emit_entities {
            self.processor.emit_derived_entities = true;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use std::io::Write;

    fn parse_args(extra: &[&str]) -> Args {
        let mut argv = vec!["location-analyzer"];
        argv.extend_from_slice(extra);
        argv.push("url:https://example.com/x");
        let mut args = Args::try_parse_from(argv).unwrap();
        args.config = None;
        args
    }

    fn file_config() -> Config {
        toml::from_str(
            r#"
[general]
concurrency = 3

[processor]
allowed_location_targets = ["https://configured.com/**"]
analysis_timeout_seconds = 30
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.processor.is_enabled());
        assert!(config.processor.allowed_targets().is_none());
        assert_eq!(config.processor.analysis_timeout_seconds, 60);
        assert!(!config.processor.emit_derived_entities);
        assert_eq!(config.general.concurrency, 4);
        assert!(config.integrations.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
concurrency = 8

[processor]
enabled = false
allowed_location_targets = ["https://github.com/acme/**"]
analysis_timeout_seconds = 5
emit_derived_entities = true

[http]
user_agent = "custom-agent"

[[integrations]]
host = "github.com"
token_env = "GITHUB_TOKEN"

[[integrations]]
host = "gitlab.internal"
kind = "gitlab"
token = "secret"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.general.concurrency, 8);
        assert!(!config.processor.is_enabled());
        assert_eq!(
            config.processor.allowed_targets(),
            Some(&["https://github.com/acme/**".to_string()][..])
        );
        assert_eq!(config.processor.analysis_timeout_seconds, 5);
        assert!(config.processor.emit_derived_entities);
        assert_eq!(config.http.user_agent, "custom-agent");
        assert_eq!(config.integrations.len(), 2);
        assert_eq!(config.integrations[1].kind.as_deref(), Some("gitlab"));
    }

    #[test]
    fn test_empty_allow_list_is_present() {
        let config: Config = toml::from_str("[processor]\nallowed_location_targets = []\n").unwrap();
        assert_eq!(config.processor.allowed_targets(), Some(&[] as &[String]));
    }

    #[test]
    fn test_explicit_enabled_true() {
        let config: Config = toml::from_str("[processor]\nenabled = true\n").unwrap();
        assert!(config.processor.is_enabled());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nconcurrency = 2").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.general.concurrency, 2);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general\nconcurrency = ").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        assert!(Config::load_optional(&path).unwrap().is_none());
    }

    #[test]
    fn test_load_optional_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[processor]\nenabled = false\nallowed_location_targets = [\"https://allowed.com/**\""
        )
        .unwrap();

        assert!(Config::load_optional(file.path()).is_err());
    }

    #[test]
    fn test_merge_overrides_file_values() {
        let mut config = file_config();
        let args = parse_args(&[
            "--allow",
            "https://cli.com/*, https://other.com/**",
            "--timeout",
            "0",
            "--emit-entities",
            "--concurrency",
            "9",
        ]);

        config.merge_with_args(&args);

        assert_eq!(
            config.processor.allowed_targets(),
            Some(&["https://cli.com/*".to_string(), "https://other.com/**".to_string()][..])
        );
        assert_eq!(config.processor.analysis_timeout_seconds, 0);
        assert!(config.processor.emit_derived_entities);
        assert_eq!(config.general.concurrency, 9);
    }

    #[test]
    fn test_merge_without_flags_keeps_file_values() {
        let mut config = file_config();
        config.merge_with_args(&parse_args(&[]));

        assert_eq!(
            config.processor.allowed_targets(),
            Some(&["https://configured.com/**".to_string()][..])
        );
        assert_eq!(config.processor.analysis_timeout_seconds, 30);
        assert!(!config.processor.emit_derived_entities);
        assert_eq!(config.general.concurrency, 3);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[processor]"));
        assert!(toml_str.contains("[http]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed.processor.allowed_targets().is_none());
    }
}

//! Processor wiring.
//!
//! Builds the integration registry and the default HTTP analyzer factory
//! from configuration and hands them to a new [`LocationProcessor`].

use crate::analyzer::HttpAnalyzerFactory;
use crate::config::Config;
use crate::integrations::IntegrationRegistry;
use crate::processor::{LocationProcessor, ProcessorOptions, PROCESSOR_NAME};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Build a processor backed by the HTTP analyzer.
pub fn build_processor(config: Arc<Config>) -> Result<LocationProcessor> {
    info!("Initializing {}", PROCESSOR_NAME);

    let integrations = IntegrationRegistry::from_config(&config.integrations)
        .context("Invalid integration configuration")?;
    info!("Registered {} integration(s)", integrations.len());

    let factory =
        HttpAnalyzerFactory::from_config(&config.http).context("Failed to create HTTP client")?;

    Ok(LocationProcessor::new(ProcessorOptions {
        config,
        integrations: Arc::new(integrations),
        analyzer_factory: Arc::new(factory),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegrationConfig;
    use crate::models::{LocationSpec, SkipReason};

    #[test]
    fn test_build_with_defaults() {
        let processor = build_processor(Arc::new(Config::default())).unwrap();
        assert_eq!(processor.processor_name(), PROCESSOR_NAME);
        assert_eq!(
            processor.check_gates(&LocationSpec::new("file", "x")),
            Err(SkipReason::UnsupportedType)
        );
    }

    #[test]
    fn test_build_rejects_bad_integrations() {
        let mut config = Config::default();
        config.integrations = vec![
            IntegrationConfig {
                host: "github.com".to_string(),
                kind: None,
                token: None,
                token_env: None,
            },
            IntegrationConfig {
                host: "github.com".to_string(),
                kind: None,
                token: None,
                token_env: None,
            },
        ];

        let err = build_processor(Arc::new(config)).err().unwrap();
        assert!(err.to_string().contains("Invalid integration configuration"));
    }
}

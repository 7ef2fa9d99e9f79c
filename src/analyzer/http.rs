//! HTTP(S) location analyzer.
//!
//! Fetches a location's document, using the integration registry for raw
//! content URLs and credentials, and counts the catalog entity documents it
//! contains.

use super::{AnalysisError, AnalyzerContext, AnalyzerFactory, LocationAnalyzer};
use crate::config::HttpConfig;
use crate::integrations::IntegrationRegistry;
use crate::models::AnalysisResult;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Instrument, Span};

/// Analyzer that reads a location over HTTP(S).
pub struct HttpLocationAnalyzer {
    client: Client,
    integrations: Arc<IntegrationRegistry>,
    span: Span,
}

impl HttpLocationAnalyzer {
    pub fn new(client: Client, context: &AnalyzerContext) -> Self {
        Self {
            client,
            integrations: Arc::clone(&context.integrations),
            span: context.span.clone(),
        }
    }

    /// Resolve the URL to fetch and the auth header to send with it.
    fn resolve(&self, target: &str) -> Result<(Url, Option<(&'static str, String)>), AnalysisError> {
        let url = Url::parse(target).map_err(|e| AnalysisError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AnalysisError::InvalidTarget {
                target: target.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        match self.integrations.for_url(&url) {
            Some(integration) => {
                debug!(
                    "Using {} integration for {} (credentials: {})",
                    integration.kind(),
                    integration.host(),
                    integration.has_token()
                );
                Ok((integration.raw_url(&url), integration.auth_header()))
            }
            None => Ok((url, None)),
        }
    }

    async fn fetch_and_count(&self, target: &str) -> Result<AnalysisResult, AnalysisError> {
        info!("Starting analysis for {}", target);

        let (url, auth) = self.resolve(target)?;

        let mut request = self.client.get(url.clone());
        if let Some((name, value)) = auth {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|source| AnalysisError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Nothing found at {}", url);
            return Ok(AnalysisResult::new(
                0,
                format!("No document found at {}", target),
            ));
        }

        if !status.is_success() {
            return Err(AnalysisError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| AnalysisError::Request {
            url: url.to_string(),
            source,
        })?;

        let count = count_entity_documents(&body);
        debug!("Analysis of {} yielded count: {}", target, count);

        Ok(AnalysisResult::new(
            count,
            format!("Found {} entity document(s) at {}", count, target),
        ))
    }
}

#[async_trait]
impl LocationAnalyzer for HttpLocationAnalyzer {
    async fn analyze(&self, target: &str) -> Result<AnalysisResult, AnalysisError> {
        self.fetch_and_count(target)
            .instrument(self.span.clone())
            .await
    }
}

/// Count YAML documents that declare a top-level `kind`.
pub fn count_entity_documents(content: &str) -> u64 {
    let mut count = 0;
    let mut has_kind = false;

    for line in content.lines() {
        if is_document_separator(line) {
            if has_kind {
                count += 1;
            }
            has_kind = false;
            continue;
        }

        if let Some(value) = line.strip_prefix("kind:") {
            if !value.trim().is_empty() {
                has_kind = true;
            }
        }
    }

    if has_kind {
        count += 1;
    }

    count
}

fn is_document_separator(line: &str) -> bool {
    match line.strip_prefix("---") {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// Factory producing [`HttpLocationAnalyzer`]s that share one HTTP client.
#[derive(Debug, Clone)]
pub struct HttpAnalyzerFactory {
    client: Client,
}

impl HttpAnalyzerFactory {
    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl AnalyzerFactory for HttpAnalyzerFactory {
    fn create_analyzer(&self, context: &AnalyzerContext) -> Box<dyn LocationAnalyzer> {
        Box::new(HttpLocationAnalyzer::new(self.client.clone(), context))
    }
}

//! Analyzer capability.
//!
//! The processor only knows the [`LocationAnalyzer`] contract. Concrete
//! analyzers are produced per processing call by an [`AnalyzerFactory`]
//! supplied when the processor is built.

pub mod http;

pub use http::HttpAnalyzerFactory;

use crate::config::Config;
use crate::integrations::IntegrationRegistry;
use crate::models::{AnalysisResult, ErrorKind, ProcessingError};
use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tracing::Span;

/// Errors an analyzer may raise.
///
/// "Nothing found" is not an error; analyzers report it as `count = 0`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error during analysis")]
    Io(#[from] std::io::Error),

    #[error("analysis did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("{0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            AnalysisError::Request { .. } => ErrorKind::Request,
            AnalysisError::Status { .. } => ErrorKind::Status,
            AnalysisError::Io(_) => ErrorKind::Io,
            AnalysisError::Timeout { .. } => ErrorKind::Timeout,
            AnalysisError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<&AnalysisError> for ProcessingError {
    fn from(err: &AnalysisError) -> Self {
        let error = ProcessingError::new(err.kind(), err.to_string());

        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        if causes.is_empty() {
            error
        } else {
            error.with_detail(causes.join(": "))
        }
    }
}

/// Read-only collaborators handed to an analyzer factory.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    pub config: Arc<Config>,
    pub integrations: Arc<IntegrationRegistry>,
    /// Span the analyzer should log under.
    pub span: Span,
}

/// Inspects one target and reports what it found.
#[async_trait]
pub trait LocationAnalyzer: Send + Sync {
    async fn analyze(&self, target: &str) -> Result<AnalysisResult, AnalysisError>;
}

/// Produces a fresh analyzer for each processing call.
///
/// Implementations must not block on shared locks.
pub trait AnalyzerFactory: Send + Sync {
    fn create_analyzer(&self, context: &AnalyzerContext) -> Box<dyn LocationAnalyzer>;
}

impl<F> AnalyzerFactory for F
where
    F: Fn(&AnalyzerContext) -> Box<dyn LocationAnalyzer> + Send + Sync,
{
    fn create_analyzer(&self, context: &AnalyzerContext) -> Box<dyn LocationAnalyzer> {
        self(context)
    }
}

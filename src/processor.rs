//! Location processor.
//!
//! For each location handed over by the host pipeline the processor runs the
//! cheap, side-effect-free gates first (type, enablement, allow-list), then
//! builds a fresh analyzer and runs it under a timeout. Exactly one outcome
//! is produced per call and analyzer failures never escape: they become a
//! `GeneralError` event.
//!
//! The processor holds no mutable state, so a single instance can serve
//! many concurrent calls.

use crate::analyzer::{AnalysisError, AnalyzerContext, AnalyzerFactory, LocationAnalyzer};
use crate::config::Config;
use crate::gate;
use crate::integrations::IntegrationRegistry;
use crate::models::{
    AnalysisResult, Entity, LocationSpec, ProcessingError, ProcessingEvent, ProcessingOutcome,
    SkipReason,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};

/// Name the processor reports to the host pipeline.
pub const PROCESSOR_NAME: &str = "LocationAnalyzerProcessor";

/// Sink receiving the events produced while processing a location.
pub trait ProcessorEmit: Send {
    fn emit(&mut self, event: ProcessingEvent);
}

impl ProcessorEmit for Vec<ProcessingEvent> {
    fn emit(&mut self, event: ProcessingEvent) {
        self.push(event);
    }
}

impl<F> ProcessorEmit for F
where
    F: FnMut(ProcessingEvent) + Send,
{
    fn emit(&mut self, event: ProcessingEvent) {
        self(event)
    }
}

/// Collaborators injected into a [`LocationProcessor`].
pub struct ProcessorOptions {
    pub config: Arc<Config>,
    pub integrations: Arc<IntegrationRegistry>,
    pub analyzer_factory: Arc<dyn AnalyzerFactory>,
}

/// Gates locations, analyzes the eligible ones and emits the outcome.
pub struct LocationProcessor {
    config: Arc<Config>,
    integrations: Arc<IntegrationRegistry>,
    analyzer_factory: Arc<dyn AnalyzerFactory>,
}

impl LocationProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            config: options.config,
            integrations: options.integrations,
            analyzer_factory: options.analyzer_factory,
        }
    }

    pub fn processor_name(&self) -> &'static str {
        PROCESSOR_NAME
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the type, enablement and allow-list checks. No I/O.
    pub fn check_gates(&self, location: &LocationSpec) -> Result<(), SkipReason> {
        if !location.is_url() {
            debug!(
                "Skipping location {} as it's not of type 'url'",
                location.target
            );
            return Err(SkipReason::UnsupportedType);
        }

        let policy = &self.config.processor;

        if !policy.is_enabled() {
            info!("{} is disabled", PROCESSOR_NAME);
            return Err(SkipReason::Disabled);
        }

        if !gate::is_allowed(&location.target, policy.allowed_targets()) {
            debug!(
                "Skipping location {} as it's not in the allow-list",
                location.target
            );
            return Err(SkipReason::NotAllowed);
        }

        Ok(())
    }

    /// Process a location and report whether this stage fully handled it.
    pub async fn read_location(&self, location: &LocationSpec, emit: &mut dyn ProcessorEmit) -> bool {
        self.process(location, emit).await.is_handled()
    }

    /// Process a location and return its terminal outcome.
    pub async fn process(
        &self,
        location: &LocationSpec,
        emit: &mut dyn ProcessorEmit,
    ) -> ProcessingOutcome {
        if let Err(reason) = self.check_gates(location) {
            return ProcessingOutcome::Skipped(reason);
        }

        let span = info_span!("analyze_location", location = %location.target);
        let context = AnalyzerContext {
            config: Arc::clone(&self.config),
            integrations: Arc::clone(&self.integrations),
            span: span.clone(),
        };
        let analyzer = self.analyzer_factory.create_analyzer(&context);

        info!("Analyzing location: {}", location.target);

        match self
            .run_analyzer(analyzer.as_ref(), &location.target)
            .instrument(span)
            .await
        {
            Ok(result) => self.handled(location, result, emit),
            Err(err) => self.failed(location, &err, emit),
        }
    }

    /// Invoke the analyzer once, bounded by the configured timeout.
    async fn run_analyzer(
        &self,
        analyzer: &dyn LocationAnalyzer,
        target: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let seconds = self.config.processor.analysis_timeout_seconds;
        if seconds == 0 {
            return analyzer.analyze(target).await;
        }

        match tokio::time::timeout(Duration::from_secs(seconds), analyzer.analyze(target)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout { seconds }),
        }
    }

    fn handled(
        &self,
        location: &LocationSpec,
        result: AnalysisResult,
        emit: &mut dyn ProcessorEmit,
    ) -> ProcessingOutcome {
        info!(
            "Analysis complete for {}: Found {} items. Message: {}",
            location.target, result.count, result.message
        );

        // The location is consumed whether or not anything was found.
        emit.emit(ProcessingEvent::LocationProcessed {
            location: location.clone(),
            requeue: false,
        });

        let derived = if result.has_findings() && self.config.processor.emit_derived_entities {
            let entity = Entity::from_analysis(location, &result, Utc::now().timestamp_millis());
            debug!("Emitting derived entity {}", entity.metadata.name);
            emit.emit(ProcessingEvent::EntityDerived {
                entity: entity.clone(),
                location: location.clone(),
            });
            Some(entity)
        } else {
            None
        };

        ProcessingOutcome::Handled {
            location: location.clone(),
            result,
            derived,
        }
    }

    fn failed(
        &self,
        location: &LocationSpec,
        err: &AnalysisError,
        emit: &mut dyn ProcessorEmit,
    ) -> ProcessingOutcome {
        let error = ProcessingError::from(err);

        error!(
            kind = %error.kind,
            detail = error.detail.as_deref().unwrap_or("-"),
            "Failed to analyze location {}: {}",
            location.target,
            error.message
        );

        emit.emit(ProcessingEvent::GeneralError {
            error: error.clone(),
            location: location.clone(),
        });

        ProcessingOutcome::Failed {
            error,
            location: location.clone(),
        }
    }
}

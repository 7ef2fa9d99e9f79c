//! Data models for the location processing stage.
//!
//! This module contains the descriptors, analysis results, derived entities,
//! and emitted events that flow between the host pipeline and the processor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Location type for network-fetchable targets.
pub const URL_LOCATION_TYPE: &str = "url";

/// Annotation carrying the analyzer's message on a derived entity.
pub const ANNOTATION_ANALYSIS_MESSAGE: &str = "location-analyzer/analysis-message";
/// Annotation carrying the analyzer's item count on a derived entity.
pub const ANNOTATION_ITEM_COUNT: &str = "location-analyzer/item-count";
/// Annotation pointing at the location that manages an entity.
pub const ANNOTATION_LOCATION: &str = "catalog/managed-by-location";
/// Annotation pointing at the location that first introduced an entity.
pub const ANNOTATION_ORIGIN_LOCATION: &str = "catalog/managed-by-origin-location";

/// A typed pointer to an external resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationSpec {
    /// Kind of pointer (e.g. `url`, `file`).
    #[serde(rename = "type")]
    pub location_type: String,
    /// Identifier matched against policy and handed to analysis.
    pub target: String,
}

impl LocationSpec {
    pub fn new(location_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            location_type: location_type.into(),
            target: target.into(),
        }
    }

    /// Shorthand for a `url` location.
    pub fn url(target: impl Into<String>) -> Self {
        Self::new(URL_LOCATION_TYPE, target)
    }

    /// Whether this location points at something fetchable over the network.
    pub fn is_url(&self) -> bool {
        self.location_type == URL_LOCATION_TYPE
    }
}

impl fmt::Display for LocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location_type, self.target)
    }
}

/// Error returned when a location reference cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationParseError {
    #[error("location reference is empty")]
    Empty,
    #[error("location reference '{0}' must look like 'type:target'")]
    MissingType(String),
    #[error("location reference '{0}' has an empty target")]
    EmptyTarget(String),
}

impl FromStr for LocationSpec {
    type Err = LocationParseError;

    /// Parses `type:target`, or a bare `http(s)://` URL as a `url` location.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LocationParseError::Empty);
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Self::url(s));
        }

        let (location_type, target) = s
            .split_once(':')
            .ok_or_else(|| LocationParseError::MissingType(s.to_string()))?;

        let location_type = location_type.trim();
        let target = target.trim();

        if location_type.is_empty() {
            return Err(LocationParseError::MissingType(s.to_string()));
        }
        if target.is_empty() {
            return Err(LocationParseError::EmptyTarget(s.to_string()));
        }

        Ok(Self::new(location_type, target))
    }
}

/// The analyzer's verdict for a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Number of items found. Zero means "no findings".
    pub count: u64,
    /// Human-readable summary.
    pub message: String,
}

impl AnalysisResult {
    pub fn new(count: u64, message: impl Into<String>) -> Self {
        Self {
            count,
            message: message.into(),
        }
    }

    pub fn has_findings(&self) -> bool {
        self.count > 0
    }
}

/// Metadata block of a derived entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Spec block of a derived `Location` entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    #[serde(rename = "type")]
    pub location_type: String,
    pub target: String,
}

/// A catalog entity derived from a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub api_version: String,
    pub kind: String,
    pub metadata: EntityMetadata,
    pub spec: EntitySpec,
}

impl Entity {
    /// Builds the `Location` entity recording an analysis of `location`.
    pub fn from_analysis(location: &LocationSpec, result: &AnalysisResult, timestamp_millis: i64) -> Self {
        let location_ref = format!("{}:{}", URL_LOCATION_TYPE, location.target);

        let mut annotations = BTreeMap::new();
        annotations.insert(
            ANNOTATION_ANALYSIS_MESSAGE.to_string(),
            result.message.clone(),
        );
        annotations.insert(ANNOTATION_ITEM_COUNT.to_string(), result.count.to_string());
        annotations.insert(ANNOTATION_LOCATION.to_string(), location_ref.clone());
        annotations.insert(ANNOTATION_ORIGIN_LOCATION.to_string(), location_ref);

        Self {
            api_version: "catalog/v1alpha1".to_string(),
            kind: "Location".to_string(),
            metadata: EntityMetadata {
                name: format!("analysis-result-{}", timestamp_millis),
                namespace: "default".to_string(),
                annotations,
            },
            spec: EntitySpec {
                location_type: URL_LOCATION_TYPE.to_string(),
                target: location.target.clone(),
            },
        }
    }
}

/// Broad category of a processing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTarget,
    Request,
    Status,
    Io,
    Timeout,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::InvalidTarget => "invalid_target",
            ErrorKind::Request => "request",
            ErrorKind::Status => "status",
            ErrorKind::Io => "io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Structured error carried by a `GeneralError` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub kind: ErrorKind,
    pub message: String,
    /// Rendered source chain, when the underlying error has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProcessingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ProcessingError {}

/// Event emitted by the processor to the host pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessingEvent {
    /// The location was consumed by this stage.
    LocationProcessed {
        location: LocationSpec,
        /// Whether the host should hand the location to its default handling too.
        requeue: bool,
    },
    /// An entity derived from a location's analysis.
    EntityDerived { entity: Entity, location: LocationSpec },
    /// Analysis failed for the location.
    GeneralError {
        error: ProcessingError,
        location: LocationSpec,
    },
}

impl ProcessingEvent {
    pub fn location(&self) -> &LocationSpec {
        match self {
            ProcessingEvent::LocationProcessed { location, .. }
            | ProcessingEvent::EntityDerived { location, .. }
            | ProcessingEvent::GeneralError { location, .. } => location,
        }
    }
}

/// Why a location was not claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The location is not a `url` location.
    UnsupportedType,
    /// The stage is switched off in configuration.
    Disabled,
    /// The target did not match the allow-list.
    NotAllowed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedType => write!(f, "unsupported location type"),
            SkipReason::Disabled => write!(f, "processor disabled"),
            SkipReason::NotAllowed => write!(f, "target not in allow-list"),
        }
    }
}

/// Terminal state of one processing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Skipped(SkipReason),
    Handled {
        location: LocationSpec,
        result: AnalysisResult,
        derived: Option<Entity>,
    },
    Failed {
        error: ProcessingError,
        location: LocationSpec,
    },
}

impl ProcessingOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, ProcessingOutcome::Handled { .. })
    }

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingOutcome::Skipped(_) => "skipped",
            ProcessingOutcome::Handled { .. } => "handled",
            ProcessingOutcome::Failed { .. } => "failed",
        }
    }
}

/// One row of a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub location: LocationSpec,
    /// `handled`, `skipped`, `failed`, or `eligible` in dry runs.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessingError>,
    /// Name of the derived entity, if one was emitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_entity: Option<String>,
    /// Number of events the processor emitted for this location.
    pub events_emitted: usize,
}

impl LocationEntry {
    /// Entry for a location that went through the processor.
    pub fn from_outcome(
        location: LocationSpec,
        outcome: &ProcessingOutcome,
        events: &[ProcessingEvent],
    ) -> Self {
        let mut entry = Self {
            location,
            status: outcome.label().to_string(),
            skip_reason: None,
            result: None,
            error: None,
            derived_entity: None,
            events_emitted: events.len(),
        };

        match outcome {
            ProcessingOutcome::Skipped(reason) => entry.skip_reason = Some(*reason),
            ProcessingOutcome::Handled {
                result, derived, ..
            } => {
                entry.result = Some(result.clone());
                entry.derived_entity = derived.as_ref().map(|e| e.metadata.name.clone());
            }
            ProcessingOutcome::Failed { error, .. } => entry.error = Some(error.clone()),
        }

        entry
    }

    /// Entry for a dry run, where only the gates were evaluated.
    pub fn from_gate(location: LocationSpec, decision: Result<(), SkipReason>) -> Self {
        let (status, skip_reason) = match decision {
            Ok(()) => ("eligible", None),
            Err(reason) => ("skipped", Some(reason)),
        };

        Self {
            location,
            status: status.to_string(),
            skip_reason,
            result: None,
            error: None,
            derived_entity: None,
            events_emitted: 0,
        }
    }
}

/// Totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub handled: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Locations that passed the gates in a dry run.
    pub eligible: usize,
    /// Sum of `count` over handled locations.
    pub findings: u64,
    pub derived_entities: usize,
}

impl RunSummary {
    pub fn from_entries(entries: &[LocationEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };

        for entry in entries {
            match entry.status.as_str() {
                "handled" => summary.handled += 1,
                "skipped" => summary.skipped += 1,
                "failed" => summary.failed += 1,
                "eligible" => summary.eligible += 1,
                _ => {}
            }

            if let Some(ref result) = entry.result {
                summary.findings += result.count;
            }
            if entry.derived_entity.is_some() {
                summary.derived_entities += 1;
            }
        }

        summary
    }
}

/// Metadata about a processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub processor: String,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub dry_run: bool,
    /// Whether an allow-list was in force.
    pub allow_list_active: bool,
}

/// The complete report for a processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub summary: RunSummary,
    pub entries: Vec<LocationEntry>,
}

impl RunReport {
    pub fn new(metadata: RunMetadata, entries: Vec<LocationEntry>) -> Self {
        Self {
            summary: RunSummary::from_entries(&entries),
            metadata,
            entries,
        }
    }
}

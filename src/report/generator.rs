//! Markdown and JSON report generation.
//!
//! This module renders a [`RunReport`] for humans (Markdown) or machines
//! (JSON).

use crate::models::{LocationEntry, RunMetadata, RunReport, RunSummary};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# Location Analysis Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_locations_section(&report.entries));
    output.push_str(&generate_errors_section(&report.entries));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Processor:** `{}`\n", metadata.processor));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if metadata.dry_run {
        section.push_str("- **Mode:** dry run (gates only, no analysis)\n");
    }
    section.push_str(&format!(
        "- **Allow-list:** {}\n",
        if metadata.allow_list_active {
            "active"
        } else {
            "not configured (all targets allowed)"
        }
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &RunSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Handled | Skipped | Failed | Eligible | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        summary.handled, summary.skipped, summary.failed, summary.eligible, summary.total
    ));

    if summary.handled > 0 {
        section.push_str(&format!("- **Total findings:** {}\n", summary.findings));
        if summary.derived_entities > 0 {
            section.push_str(&format!(
                "- **Derived entities:** {}\n",
                summary.derived_entities
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the per-location table.
fn generate_locations_section(entries: &[LocationEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Locations\n\n");

    if entries.is_empty() {
        section.push_str("No locations were processed.\n\n");
        return section;
    }

    section.push_str("| Location | Status | Count | Details |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");

    for entry in entries {
        let count = entry
            .result
            .as_ref()
            .map(|r| r.count.to_string())
            .unwrap_or_else(|| "-".to_string());

        section.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            escape_cell(&entry.location.to_string()),
            entry.status,
            count,
            escape_cell(&entry_details(entry))
        ));
    }
    section.push('\n');

    section
}

fn entry_details(entry: &LocationEntry) -> String {
    if let Some(reason) = entry.skip_reason {
        return reason.to_string();
    }
    if let Some(ref error) = entry.error {
        return error.to_string();
    }

    let mut details = entry
        .result
        .as_ref()
        .map(|r| r.message.clone())
        .unwrap_or_default();
    if let Some(ref name) = entry.derived_entity {
        details.push_str(&format!(" (entity `{}`)", name));
    }
    details
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate the errors section with diagnostic detail.
fn generate_errors_section(entries: &[LocationEntry]) -> String {
    let failures: Vec<_> = entries
        .iter()
        .filter_map(|e| e.error.as_ref().map(|err| (&e.location, err)))
        .collect();

    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Errors\n\n");

    for (location, error) in failures {
        section.push_str(&format!("### `{}`\n\n", location));
        section.push_str(&format!("- **Kind:** {}\n", error.kind));
        section.push_str(&format!("- **Message:** {}\n", error.message));
        if let Some(ref detail) = error.detail {
            section.push_str(&format!("\n```\n{}\n```\n", detail));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by location-analyzer v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnalysisResult, ErrorKind, LocationSpec, ProcessingError, ProcessingOutcome, SkipReason,
    };
    use chrono::Utc;

    fn create_test_report() -> RunReport {
        let handled = LocationSpec::url("https://github.com/acme/repo/blob/main/catalog-info.yaml");
        let failed = LocationSpec::url("https://example.com/broken|pipe.yaml");

        let entries = vec![
            LocationEntry::from_outcome(
                handled.clone(),
                &ProcessingOutcome::Handled {
                    location: handled,
                    result: AnalysisResult::new(2, "Found 2 entity document(s)"),
                    derived: None,
                },
                &[],
            ),
            LocationEntry::from_outcome(
                failed.clone(),
                &ProcessingOutcome::Failed {
                    error: ProcessingError::new(ErrorKind::Request, "request failed")
                        .with_detail("connection refused"),
                    location: failed,
                },
                &[],
            ),
            LocationEntry::from_outcome(
                LocationSpec::new("file", "./catalog-info.yaml"),
                &ProcessingOutcome::Skipped(SkipReason::UnsupportedType),
                &[],
            ),
        ];

        RunReport::new(
            RunMetadata {
                processor: "LocationAnalyzerProcessor".to_string(),
                generated_at: Utc::now(),
                duration_seconds: 1.5,
                dry_run: false,
                allow_list_active: true,
            },
            entries,
        )
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Location Analysis Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Locations"));
        assert!(markdown.contains("## Errors"));
        assert!(markdown.contains("| 1 | 1 | 1 | 0 | **3** |"));
        assert!(markdown.contains("unsupported location type"));
        assert!(markdown.contains("connection refused"));
        assert!(markdown.contains("broken\\|pipe"));
    }

    #[test]
    fn test_no_errors_section_when_clean() {
        let mut report = create_test_report();
        report.entries.retain(|e| e.error.is_none());

        assert!(generate_errors_section(&report.entries).is_empty());
    }

    #[test]
    fn test_dry_run_metadata() {
        let mut report = create_test_report();
        report.metadata.dry_run = true;
        report.metadata.allow_list_active = false;

        let section = generate_metadata_section(&report.metadata);
        assert!(section.contains("dry run"));
        assert!(section.contains("all targets allowed"));
    }

    #[test]
    fn test_empty_locations() {
        let section = generate_locations_section(&[]);
        assert!(section.contains("No locations were processed."));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["entries"][0]["status"], "handled");
        assert_eq!(value["entries"][1]["error"]["kind"], "request");
        assert_eq!(value["entries"][2]["skip_reason"], "unsupported_type");
    }
}

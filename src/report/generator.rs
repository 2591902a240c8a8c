//! Text and JSON report generation.
//!
//! Standard output only carries the result: the aggregate for a fan-in
//! run, the received messages for the demos, or the whole report as one
//! JSON line. The longer summary is written to the `--output` file.

use crate::cli::OutputFormat;
use crate::models::{RunKind, RunMetadata, RunReport};
use anyhow::{Context, Result};
use std::path::Path;

/// What gets printed on standard output once a run finishes.
pub fn result_line(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(report).map_err(Into::into),
        OutputFormat::Text => Ok(match report.aggregate {
            Some(aggregate) => aggregate.to_string(),
            None => report.messages.join("\n"),
        }),
    }
}

/// Generate a multi-line text summary.
pub fn generate_text_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("fanin {} report\n\n", report.metadata.kind));
    output.push_str(&generate_metadata_section(&report.metadata));

    output.push_str(&format!("Received: {}\n", report.received));
    if let Some(aggregate) = report.aggregate {
        output.push_str(&format!("Aggregate: {}\n", aggregate));
    }

    if !report.messages.is_empty() {
        output.push_str("\nMessages:\n");
        for (i, message) in report.messages.iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, message));
        }
    }

    output
}

fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "Run Date: {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("Producers: {}\n", metadata.producers));

    if metadata.kind == RunKind::Count {
        if let Some(per_producer) = metadata.per_producer {
            section.push_str(&format!("Per Producer: {}\n", per_producer));
        }
        if let Some(contribution) = metadata.contribution {
            section.push_str(&format!("Contribution: {}\n", contribution));
        }
        if let Some(expected) = metadata.expected_receives {
            section.push_str(&format!("Expected Receives: {}\n", expected));
        }
    }

    section.push_str(&format!("Duration: {:.3}s\n", metadata.duration_seconds));

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the report to a file in the given format.
pub fn write_report(report: &RunReport, format: OutputFormat, path: &Path) -> Result<()> {
    let content = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Text => generate_text_report(report),
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

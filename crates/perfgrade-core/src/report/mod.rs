//! Report files: format detection, loading, and rendering.

pub mod console;
pub mod csv;
pub mod html;
pub mod json;
pub mod progress;
pub mod schema;

use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::errors::{BenchError, Result};
use crate::grade::{aggregate_endpoints, grade_metrics, ThresholdSet};
use crate::model::{ComparisonResult, EndpointMetrics, Endpoints, Grade, Grades, Latency, Report};

/// Column order shared by the CSV and HTML report tables.
pub const REPORT_COLUMNS: [&str; 12] = [
    "method",
    "path",
    "rps",
    "rps_grade",
    "p50",
    "p50_grade",
    "p90",
    "p90_grade",
    "p99",
    "p99_grade",
    "errors",
    "final_grade",
];

/// Column order shared by the CSV and HTML comparison tables.
pub const COMPARISON_COLUMNS: [&str; 24] = [
    "method",
    "path",
    "baseline_rps",
    "target_rps",
    "delta_rps",
    "baseline_rps_grade",
    "target_rps_grade",
    "baseline_p50",
    "target_p50",
    "delta_p50",
    "baseline_p50_grade",
    "target_p50_grade",
    "baseline_p90",
    "target_p90",
    "delta_p90",
    "baseline_p90_grade",
    "target_p90_grade",
    "baseline_p99",
    "target_p99",
    "delta_p99",
    "baseline_p99_grade",
    "target_p99_grade",
    "baseline_grade",
    "target_grade",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Html,
}

impl ReportFormat {
    /// Detect the format from a file extension (`json`, `csv`, `html`, `htm`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "html" | "htm" => Ok(Self::Html),
            "" => Err(BenchError::config(format!(
                "cannot detect report format of '{}': no file extension (expected .json, .csv or .html)",
                path.display()
            ))),
            other => Err(BenchError::config(format!(
                "unsupported report format '.{other}' for '{}' (expected .json, .csv or .html)",
                path.display()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint as read from a file; grades may be absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadedEndpoint {
    pub method: String,
    pub path: String,
    pub rps: f64,
    pub latency: Latency,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub grades: Option<Grades>,
}

/// Report as read from a file, before missing grades are filled in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedReport {
    pub label: String,
    pub timestamp: String,
    pub endpoints: IndexMap<String, LoadedEndpoint>,
    #[serde(default)]
    pub final_grade: Option<Grade>,
}

impl LoadedReport {
    /// Recompute missing grades with `thresholds` and re-aggregate a missing final grade.
    pub fn finalize(self, thresholds: &ThresholdSet) -> Report {
        let mut recomputed = 0usize;
        let endpoints: Endpoints = self
            .endpoints
            .into_iter()
            .map(|(key, e)| {
                let grades = e.grades.unwrap_or_else(|| {
                    recomputed += 1;
                    grade_metrics(&e.latency, e.rps, thresholds)
                });
                let metrics = EndpointMetrics {
                    method: e.method,
                    path: e.path,
                    rps: e.rps,
                    latency: e.latency,
                    errors: e.errors,
                    grades,
                };
                (key, metrics)
            })
            .collect();
        if recomputed > 0 {
            tracing::debug!(label = %self.label, recomputed, "recomputed missing grades");
        }
        let final_grade = self
            .final_grade
            .unwrap_or_else(|| aggregate_endpoints(&endpoints));
        Report {
            label: self.label,
            timestamp: self.timestamp,
            endpoints,
            final_grade,
        }
    }
}

/// Load a report file, choosing the parser from its extension.
pub fn load_report(path: &Path, thresholds: &ThresholdSet) -> Result<Report> {
    let format = ReportFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    let loaded = match format {
        ReportFormat::Json => json::parse_report(&raw)?,
        ReportFormat::Csv => {
            let (label, timestamp) = file_defaults(path);
            csv::parse_report(&raw, &label, &timestamp)?
        }
        ReportFormat::Html => html::parse_report(&raw)?,
    };
    tracing::info!(
        path = %path.display(),
        format = %format,
        endpoints = loaded.endpoints.len(),
        "loaded report"
    );
    Ok(loaded.finalize(thresholds))
}

/// Label and timestamp used when a CSV file carries no metadata row.
fn file_defaults(path: &Path) -> (String, String) {
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let timestamp = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| {
            chrono::DateTime::<chrono::Utc>::from(t)
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        })
        .unwrap_or_default();
    (label, timestamp)
}

pub fn render_report(report: &Report, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => json::render_report(report),
        ReportFormat::Csv => csv::render_report(report),
        ReportFormat::Html => Ok(html::render_report(report)),
    }
}

/// Render comparison results. `results` are expected to be sorted already.
pub fn render_comparison(
    results: &[ComparisonResult],
    baseline_label: &str,
    target_label: &str,
    format: ReportFormat,
) -> Result<String> {
    match format {
        ReportFormat::Json => json::render_comparison(results),
        ReportFormat::Csv => csv::render_comparison(results),
        ReportFormat::Html => Ok(html::render_comparison(
            results,
            baseline_label,
            target_label,
        )),
    }
}

pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| BenchError::io(path, e))?;
    tracing::info!(path = %path.display(), "wrote report");
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn endpoint(method: &str, path: &str, rps: f64, p90: f64) -> EndpointMetrics {
        let latency = Latency {
            p50: p90 / 2.0,
            p90,
            p99: p90 * 1.5,
        };
        EndpointMetrics {
            method: method.into(),
            path: path.into(),
            rps,
            latency,
            errors: 0,
            grades: grade_metrics(&latency, rps, &ThresholdSet::default()),
        }
    }

    pub fn report(label: &str, endpoints: Vec<EndpointMetrics>) -> Report {
        let endpoints: Endpoints = endpoints.into_iter().map(|e| (e.key(), e)).collect();
        Report {
            label: label.into(),
            timestamp: "2024-05-01T12:00:00.000Z".into(),
            final_grade: aggregate_endpoints(&endpoints),
            endpoints,
        }
    }
}

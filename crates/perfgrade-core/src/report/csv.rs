//! CSV reports: an optional `"label:…","timestamp:…"` metadata row, a header
//! row, then one row per endpoint.

use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::IndexMap;

use super::{LoadedEndpoint, LoadedReport, COMPARISON_COLUMNS, REPORT_COLUMNS};
use crate::errors::{BenchError, Result};
use crate::model::{endpoint_key, ComparisonResult, Grade, Grades, Latency, Metric, Report};

fn writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .flexible(true)
        .from_writer(Vec::new())
}

fn finish(w: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = w
        .into_inner()
        .map_err(|e| BenchError::report_format(format!("writing CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| BenchError::report_format(format!("writing CSV: {e}")))
}

fn write_err(e: csv::Error) -> BenchError {
    BenchError::report_format(format!("writing CSV: {e}"))
}

pub fn render_report(report: &Report) -> Result<String> {
    let mut w = writer();
    w.write_record([meta_cell("label", &report.label), meta_cell("timestamp", &report.timestamp)])
    .map_err(write_err)?;
    w.write_record(REPORT_COLUMNS).map_err(write_err)?;
    for e in report.endpoints.values() {
        w.write_record([
            e.method.clone(),
            e.path.clone(),
            e.rps.to_string(),
            e.grades.rps.to_string(),
            e.latency.p50.to_string(),
            e.grades.p50.to_string(),
            e.latency.p90.to_string(),
            e.grades.p90.to_string(),
            e.latency.p99.to_string(),
            e.grades.p99.to_string(),
            e.errors.to_string(),
            e.grades.final_grade.to_string(),
        ])
        .map_err(write_err)?;
    }
    finish(w)
}

pub fn render_comparison(results: &[ComparisonResult]) -> Result<String> {
    let mut w = writer();
    w.write_record(COMPARISON_COLUMNS).map_err(write_err)?;
    for r in results {
        let mut row = vec![r.method.clone(), r.path.clone()];
        for metric in [Metric::Rps, Metric::P50, Metric::P90, Metric::P99] {
            row.push(r.baseline.value(metric).to_string());
            row.push(r.target.value(metric).to_string());
            row.push(r.delta.get(metric).to_string());
            row.push(r.baseline.grades.get(metric).to_string());
            row.push(r.target.grades.get(metric).to_string());
        }
        row.push(r.baseline.grades.final_grade.to_string());
        row.push(r.target.grades.final_grade.to_string());
        w.write_record(&row).map_err(write_err)?;
    }
    finish(w)
}

fn line_of(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

/// `key:value`, or the legacy `key: "<json string>"` form when the value itself
/// would read as legacy (leading space or quote).
fn meta_cell(key: &str, value: &str) -> String {
    if value.starts_with([' ', '"']) {
        let quoted = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""));
        format!("{key}: {quoted}")
    } else {
        format!("{key}:{value}")
    }
}

/// Value of a metadata cell. `key: "<json string>"` is decoded; anything else after `key:` is kept verbatim.
fn meta_value(cell: &str, key: &str) -> Option<String> {
    let rest = cell.strip_prefix(key)?.strip_prefix(':')?;
    if let Some(legacy) = rest.strip_prefix(' ') {
        if let Ok(s) = serde_json::from_str::<String>(legacy.trim()) {
            return Some(s);
        }
    }
    Some(rest.to_string())
}

fn number<T: std::str::FromStr>(record: &StringRecord, idx: usize) -> Result<T> {
    let cell = record.get(idx).unwrap_or_default().trim();
    cell.parse().map_err(|_| {
        BenchError::report_format_at(
            format!("column '{}' is not a number: '{cell}'", REPORT_COLUMNS[idx]),
            line_of(record),
        )
    })
}

fn grades(record: &StringRecord) -> Result<Option<Grades>> {
    const GRADE_COLUMNS: [usize; 5] = [3, 5, 7, 9, 11];
    let cells: Vec<&str> = GRADE_COLUMNS
        .iter()
        .map(|&i| record.get(i).unwrap_or_default().trim())
        .collect();
    if cells.iter().all(|c| c.is_empty()) {
        return Ok(None);
    }
    let parse = |i: usize| -> Result<Grade> {
        cells[i].parse().map_err(|e: BenchError| {
            BenchError::report_format_at(e.to_string(), line_of(record))
        })
    };
    Ok(Some(Grades {
        rps: parse(0)?,
        p50: parse(1)?,
        p90: parse(2)?,
        p99: parse(3)?,
        final_grade: parse(4)?,
    }))
}

/// Parse a CSV report. `default_label` and `default_timestamp` apply when the
/// metadata row is absent.
pub fn parse_report(raw: &str, default_label: &str, default_timestamp: &str) -> Result<LoadedReport> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let mut records = reader.records();

    let read = |r: Option<std::result::Result<StringRecord, csv::Error>>| -> Result<Option<StringRecord>> {
        r.transpose().map_err(|e| {
            let line = e.position().map_or(0, |p| p.line() as usize);
            BenchError::report_format_at(format!("invalid CSV: {e}"), line)
        })
    };

    let mut label = default_label.to_string();
    let mut timestamp = default_timestamp.to_string();

    let Some(mut first) = read(records.next())? else {
        return Err(BenchError::report_format("empty CSV report"));
    };
    if let Some(l) = first.get(0).and_then(|c| meta_value(c, "label")) {
        label = l;
        if let Some(t) = first.get(1).and_then(|c| meta_value(c, "timestamp")) {
            timestamp = t;
        }
        first = read(records.next())?
            .ok_or_else(|| BenchError::report_format("CSV report has no header row"))?;
    }
    if !first
        .get(0)
        .is_some_and(|c| c.trim().eq_ignore_ascii_case("method"))
    {
        return Err(BenchError::report_format_at(
            "expected header row starting with 'method'",
            line_of(&first),
        ));
    }

    let mut endpoints = IndexMap::new();
    while let Some(record) = read(records.next())? {
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if record.len() < REPORT_COLUMNS.len() {
            return Err(BenchError::report_format_at(
                format!(
                    "expected {} cells, found {}",
                    REPORT_COLUMNS.len(),
                    record.len()
                ),
                line_of(&record),
            ));
        }
        let method = record.get(0).unwrap_or_default().trim().to_string();
        let path = record.get(1).unwrap_or_default().to_string();
        if method.is_empty() {
            return Err(BenchError::report_format_at("empty method", line_of(&record)));
        }
        let endpoint = LoadedEndpoint {
            rps: number(&record, 2)?,
            latency: Latency {
                p50: number(&record, 4)?,
                p90: number(&record, 6)?,
                p99: number(&record, 8)?,
            },
            errors: number(&record, 10)?,
            grades: grades(&record)?,
            method,
            path,
        };
        endpoints.insert(endpoint_key(&endpoint.method, &endpoint.path), endpoint);
    }

    Ok(LoadedReport {
        label,
        timestamp,
        endpoints,
        final_grade: None,
    })
}

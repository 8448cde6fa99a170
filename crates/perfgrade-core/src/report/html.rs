//! Self-contained HTML reports and the regex-based reader for them.

use indexmap::IndexMap;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

use super::{LoadedEndpoint, LoadedReport, COMPARISON_COLUMNS, REPORT_COLUMNS};
use crate::compare::{format_percent, is_improvement, summarize};
use crate::errors::{BenchError, Result};
use crate::model::{endpoint_key, ComparisonResult, Grade, Grades, Latency, Metric, Report};

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;margin-top:1rem}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:right}\
th{background:#f3f3f3}\
td.text{text-align:left}\
.excellent{color:#11772d}.good{color:#2b6cb0}.acceptable{color:#b7791f}.needs-improvement{color:#c53030}\
.better{color:#11772d}.worse{color:#c53030}";

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn grade_class(g: Grade) -> &'static str {
    match g {
        Grade::Excellent => "excellent",
        Grade::Good => "good",
        Grade::Acceptable => "acceptable",
        Grade::NeedsImprovement => "needs-improvement",
    }
}

fn open_document(out: &mut String, title: &str) {
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n",
        escape(title)
    );
}

fn close_document(out: &mut String) {
    out.push_str("</body>\n</html>\n");
}

fn header_row(out: &mut String, columns: &[&str]) {
    out.push_str("<tr>");
    for c in columns {
        let _ = write!(out, "<th>{}</th>", escape(c));
    }
    out.push_str("</tr>\n");
}

fn text_cell(out: &mut String, s: &str) {
    let _ = write!(out, "<td class=\"text\">{}</td>", escape(s));
}

fn num_cell(out: &mut String, v: impl std::fmt::Display) {
    let _ = write!(out, "<td>{v}</td>");
}

fn grade_cell(out: &mut String, g: Grade) {
    let _ = write!(out, "<td class=\"{}\">{}</td>", grade_class(g), escape(g.as_str()));
}

pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    open_document(&mut out, &format!("Benchmark report: {}", report.label));
    out.push_str("<h1>Benchmark report</h1>\n");
    let _ = writeln!(out, "<p><strong>Label:</strong> {}</p>", escape(&report.label));
    let _ = writeln!(
        out,
        "<p><strong>Timestamp:</strong> {}</p>",
        escape(&report.timestamp)
    );
    let _ = writeln!(
        out,
        "<p><strong>Final grade:</strong> <span class=\"{}\">{}</span></p>",
        grade_class(report.final_grade),
        escape(report.final_grade.as_str())
    );

    out.push_str("<table>\n");
    header_row(&mut out, &REPORT_COLUMNS);
    for e in report.endpoints.values() {
        out.push_str("<tr>");
        text_cell(&mut out, &e.method);
        text_cell(&mut out, &e.path);
        num_cell(&mut out, e.rps);
        grade_cell(&mut out, e.grades.rps);
        num_cell(&mut out, e.latency.p50);
        grade_cell(&mut out, e.grades.p50);
        num_cell(&mut out, e.latency.p90);
        grade_cell(&mut out, e.grades.p90);
        num_cell(&mut out, e.latency.p99);
        grade_cell(&mut out, e.grades.p99);
        num_cell(&mut out, e.errors);
        grade_cell(&mut out, e.grades.final_grade);
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    close_document(&mut out);
    out
}

fn percent_cell(out: &mut String, metric: Metric, pct: f64) {
    let class = if pct == 0.0 || pct.is_nan() {
        ""
    } else if is_improvement(metric, pct) {
        " class=\"better\""
    } else {
        " class=\"worse\""
    };
    let _ = write!(out, "<td{class}>{}</td>", escape(&format_percent(pct)));
}

pub fn render_comparison(results: &[ComparisonResult], baseline_label: &str, target_label: &str) -> String {
    let mut out = String::new();
    open_document(
        &mut out,
        &format!("Benchmark comparison: {baseline_label} vs {target_label}"),
    );
    out.push_str("<h1>Benchmark comparison</h1>\n");
    let _ = writeln!(out, "<p><strong>Baseline:</strong> {}</p>", escape(baseline_label));
    let _ = writeln!(out, "<p><strong>Target:</strong> {}</p>", escape(target_label));
    let _ = writeln!(
        out,
        "<h2>Executive summary</h2>\n<p class=\"summary\">{}</p>",
        escape(&summarize(results).sentence())
    );

    let mut columns: Vec<&str> = COMPARISON_COLUMNS.to_vec();
    for metric in [Metric::Rps, Metric::P50, Metric::P90, Metric::P99] {
        let after_delta = columns
            .iter()
            .position(|c| *c == format!("delta_{}", metric.as_str()))
            .map_or(columns.len(), |i| i + 1);
        columns.insert(after_delta, percent_label(metric));
    }

    out.push_str("<table>\n");
    header_row(&mut out, &columns);
    for r in results {
        out.push_str("<tr>");
        text_cell(&mut out, &r.method);
        text_cell(&mut out, &r.path);
        for metric in [Metric::Rps, Metric::P50, Metric::P90, Metric::P99] {
            num_cell(&mut out, r.baseline.value(metric));
            num_cell(&mut out, r.target.value(metric));
            num_cell(&mut out, r.delta.get(metric));
            percent_cell(&mut out, metric, r.percent_change.get(metric));
            grade_cell(&mut out, r.baseline.grades.get(metric));
            grade_cell(&mut out, r.target.grades.get(metric));
        }
        grade_cell(&mut out, r.baseline.grades.final_grade);
        grade_cell(&mut out, r.target.grades.final_grade);
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    close_document(&mut out);
    out
}

fn percent_label(metric: Metric) -> &'static str {
    match metric {
        Metric::Rps => "change_rps",
        Metric::P50 => "change_p50",
        Metric::P90 => "change_p90",
        Metric::P99 => "change_p99",
    }
}

struct Patterns {
    label: Regex,
    timestamp: Regex,
    row: Regex,
    cell: Regex,
    tag: Regex,
}

fn patterns() -> Result<&'static Patterns> {
    static PATTERNS: OnceLock<std::result::Result<Patterns, String>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let re = |p: &str| Regex::new(p).map_err(|e| e.to_string());
            Ok(Patterns {
                label: re(r"<strong>Label:</strong> ?([^<]*)")?,
                timestamp: re(r"<strong>Timestamp:</strong> ?([^<]*)")?,
                row: re(r"(?s)<tr[^>]*>(.*?)</tr>")?,
                cell: re(r"(?s)<td[^>]*>(.*?)</td>")?,
                tag: re(r"<[^>]+>")?,
            })
        })
        .as_ref()
        .map_err(|e| BenchError::report_format(e.clone()))
}

/// Line number (1-based) of a byte offset.
fn line_at(html: &str, offset: usize) -> usize {
    html[..offset].matches('\n').count() + 1
}

pub fn parse_report(html: &str) -> Result<LoadedReport> {
    let p = patterns()?;
    let field = |re: &Regex| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| unescape(m.as_str()))
    };
    let label = field(&p.label)
        .ok_or_else(|| BenchError::report_format("HTML report has no Label field"))?;
    let timestamp = field(&p.timestamp)
        .ok_or_else(|| BenchError::report_format("HTML report has no Timestamp field"))?;

    let mut endpoints = IndexMap::new();
    for row in p.row.captures_iter(html) {
        let (Some(whole), Some(inner)) = (row.get(0), row.get(1)) else {
            continue;
        };
        let cells: Vec<String> = p
            .cell
            .captures_iter(inner.as_str())
            .filter_map(|c| c.get(1))
            .map(|m| unescape(&p.tag.replace_all(m.as_str(), "")))
            .collect();
        if cells.is_empty() {
            // header row
            continue;
        }
        let line = line_at(html, whole.start());
        if cells.len() < REPORT_COLUMNS.len() {
            return Err(BenchError::report_format_at(
                format!(
                    "expected {} cells, found {}",
                    REPORT_COLUMNS.len(),
                    cells.len()
                ),
                line,
            ));
        }
        let num = |i: usize| -> Result<f64> {
            cells[i].trim().parse().map_err(|_| {
                BenchError::report_format_at(
                    format!("column '{}' is not a number: '{}'", REPORT_COLUMNS[i], cells[i]),
                    line,
                )
            })
        };
        let grade = |i: usize| -> Result<Grade> {
            cells[i]
                .trim()
                .parse()
                .map_err(|e: BenchError| BenchError::report_format_at(e.to_string(), line))
        };
        let errors: u64 = cells[10].trim().parse().map_err(|_| {
            BenchError::report_format_at(format!("column 'errors' is not a count: '{}'", cells[10]), line)
        })?;
        let endpoint = LoadedEndpoint {
            method: cells[0].trim().to_string(),
            path: cells[1].clone(),
            rps: num(2)?,
            latency: Latency {
                p50: num(4)?,
                p90: num(6)?,
                p99: num(8)?,
            },
            errors,
            grades: Some(Grades {
                rps: grade(3)?,
                p50: grade(5)?,
                p90: grade(7)?,
                p99: grade(9)?,
                final_grade: grade(11)?,
            }),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare_reports;
    use crate::grade::ThresholdSet;
    use crate::report::fixtures;

    #[test]
    fn escapes_cell_text() {
        let report = fixtures::report("a<b>&c", vec![fixtures::endpoint("GET", "/q?<x>", 1.0, 1.0)]);
        let html = render_report(&report);
        assert!(html.contains("<strong>Label:</strong> a&lt;b&gt;&amp;c"));
        assert!(html.contains("/q?&lt;x&gt;"));
        let back = parse_report(&html).unwrap().finalize(&ThresholdSet::default());
        assert_eq!(back.label, "a<b>&c");
        assert!(back.endpoints.contains_key("GET /q?<x>"));
    }

    #[test]
    fn label_and_path_whitespace_is_kept() {
        let mut report = fixtures::report("  padded  ", vec![fixtures::endpoint("GET", " /spaced ", 1.0, 1.0)]);
        report.timestamp = " t ".into();
        let back = parse_report(&render_report(&report)).unwrap();
        assert_eq!(back.label, "  padded  ");
        assert_eq!(back.timestamp, " t ");
        assert_eq!(back.endpoints["GET  /spaced "].path, " /spaced ");
    }

    #[test]
    fn single_table_with_header_row() {
        let report = fixtures::report("x", vec![fixtures::endpoint("GET", "/a", 1.0, 1.0)]);
        let html = render_report(&report);
        assert_eq!(html.matches("<table>").count(), 1);
        assert_eq!(html.matches("<th>").count(), REPORT_COLUMNS.len());
    }

    #[test]
    fn short_row_is_rejected_with_line() {
        let html = "<p><strong>Label:</strong> x</p>\n<p><strong>Timestamp:</strong> t</p>\n\
                    <table>\n<tr><th>method</th></tr>\n<tr><td>GET</td><td>/a</td></tr>\n</table>";
        let err = parse_report(html).unwrap_err();
        assert!(matches!(err, BenchError::ReportFormat { line: Some(5), .. }), "{err}");
    }

    #[test]
    fn comparison_contains_summary_and_signed_percent() {
        let base = fixtures::report("b", vec![fixtures::endpoint("GET", "/a", 100.0, 100.0)]);
        let target = fixtures::report("t", vec![fixtures::endpoint("GET", "/a", 150.0, 80.0)]);
        let html = render_comparison(&compare_reports(&base, &target), "b", "t");
        assert!(html.contains("Executive summary"));
        assert!(html.contains("<td class=\"better\">+50.0%</td>"));
        assert!(html.contains("<td class=\"better\">-25.0%</td>"));
        assert!(html.contains("<th>change_p90</th>"));
    }
}

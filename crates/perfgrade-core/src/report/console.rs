use std::fmt::Write as _;

use crate::compare::{format_percent, sort_endpoints, summarize};
use crate::model::{ComparisonResult, Metric, Report};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn endpoint_width<'a>(keys: impl Iterator<Item = &'a str>) -> usize {
    keys.map(|k| k.chars().count()).max().unwrap_or(0).clamp(8, 60)
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Fixed-width endpoint table, sorted by `sort_by`, followed by the final grade.
pub fn render_report(report: &Report, sort_by: Metric) -> String {
    let rows = sort_endpoints(report, sort_by);
    let keys: Vec<String> = rows.iter().map(|e| e.key()).collect();
    let w = endpoint_width(keys.iter().map(String::as_str));

    let mut out = String::new();
    let _ = writeln!(out, "Report: {} ({})", report.label, report.timestamp);
    let _ = writeln!(
        out,
        "{:<w$}  {:>10}  {:>10}  {:>10}  {:>10}  {:>7}  {}",
        "Endpoint", "RPS", "p50 ms", "p90 ms", "p99 ms", "Errors", "Grade"
    );
    for (e, key) in rows.iter().zip(&keys) {
        let _ = writeln!(
            out,
            "{:<w$}  {:>10.1}  {:>10.1}  {:>10.1}  {:>10.1}  {:>7}  {}",
            truncate(key, w),
            e.rps,
            e.latency.p50,
            e.latency.p90,
            e.latency.p99,
            e.errors,
            e.grades.final_grade
        );
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Final grade: {} ({} endpoint(s), sorted by {})",
        report.final_grade,
        report.endpoints.len(),
        sort_by
    );
    out
}

/// Comparison table with signed percent changes and the executive summary.
pub fn render_comparison(results: &[ComparisonResult], baseline_label: &str, target_label: &str) -> String {
    let keys: Vec<String> = results
        .iter()
        .map(|r| crate::model::endpoint_key(&r.method, &r.path))
        .collect();
    let w = endpoint_width(keys.iter().map(String::as_str));

    let mut out = String::new();
    let _ = writeln!(out, "Comparison: {baseline_label} (baseline) vs {target_label} (target)");
    let _ = writeln!(
        out,
        "{:<w$}  {:>10}  {:>10}  {:>9}  {:>10}  {:>10}  {:>9}  {:>9}  {:>9}",
        "Endpoint", "RPS base", "RPS tgt", "RPS Δ%", "p90 base", "p90 tgt", "p90 Δ%", "p50 Δ%", "p99 Δ%"
    );
    for (r, key) in results.iter().zip(&keys) {
        let _ = writeln!(
            out,
            "{:<w$}  {:>10.1}  {:>10.1}  {:>9}  {:>10.1}  {:>10.1}  {:>9}  {:>9}  {:>9}",
            truncate(key, w),
            r.baseline.rps,
            r.target.rps,
            format_percent(r.percent_change.rps),
            r.baseline.latency.p90,
            r.target.latency.p90,
            format_percent(r.percent_change.p90),
            format_percent(r.percent_change.p50),
            format_percent(r.percent_change.p99),
        );
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{}", summarize(results).sentence());
    out
}

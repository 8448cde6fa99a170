//! Report diffing.
//!
//! Percent change uses the smaller of the two values as denominator and
//! always carries the sign of `target - baseline`:
//!
//! * equal values → `0`
//! * one side zero (or negative), the other not → `±inf`
//! * otherwise → `(target - baseline) / min(baseline, target) * 100`
//!
//! For latency a negative change is an improvement, for throughput a
//! positive one is.

use std::cmp::Ordering;

use crate::model::{
    ComparisonResult, EndpointMetrics, Metric, MetricDeltas, MetricFamily, PercentChange, Report,
};

pub fn percent_change(baseline: f64, target: f64) -> f64 {
    if baseline == target {
        return 0.0;
    }
    let denominator = baseline.min(target);
    if denominator <= 0.0 {
        return if target > baseline {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };
    }
    (target - baseline) / denominator * 100.0
}

/// Whether a percent change for `metric` reads as an improvement.
pub fn is_improvement(metric: Metric, pct: f64) -> bool {
    match metric.family() {
        MetricFamily::Latency => pct < 0.0,
        MetricFamily::Throughput => pct > 0.0,
    }
}

fn compare_endpoint(base: &EndpointMetrics, targ: &EndpointMetrics) -> ComparisonResult {
    let delta = MetricDeltas {
        p50: targ.latency.p50 - base.latency.p50,
        p90: targ.latency.p90 - base.latency.p90,
        p99: targ.latency.p99 - base.latency.p99,
        rps: targ.rps - base.rps,
    };
    let percent_change = PercentChange {
        p50: percent_change(base.latency.p50, targ.latency.p50),
        p90: percent_change(base.latency.p90, targ.latency.p90),
        p99: percent_change(base.latency.p99, targ.latency.p99),
        rps: percent_change(base.rps, targ.rps),
    };
    ComparisonResult {
        method: base.method.clone(),
        path: base.path.clone(),
        baseline: base.clone(),
        target: targ.clone(),
        delta,
        percent_change,
    }
}

/// One result per endpoint key present in both reports, in baseline order.
/// Keys missing from either side are skipped.
pub fn compare_reports(baseline: &Report, target: &Report) -> Vec<ComparisonResult> {
    let mut out = Vec::new();
    for (key, base) in &baseline.endpoints {
        let Some(targ) = target.endpoints.get(key) else {
            tracing::debug!(endpoint = %key, "endpoint missing from target report; skipped");
            continue;
        };
        out.push(compare_endpoint(base, targ));
    }
    out
}

/// Most improved first: latency ascending, throughput descending.
pub fn sort_comparison(results: &mut [ComparisonResult], by: Metric) {
    results.sort_by(|a, b| {
        let (x, y) = (a.percent_change.get(by), b.percent_change.get(by));
        directional_cmp(by, x, y)
    });
}

/// Best first: latency ascending, throughput descending.
pub fn sort_endpoints(report: &Report, by: Metric) -> Vec<&EndpointMetrics> {
    let mut rows: Vec<&EndpointMetrics> = report.endpoints.values().collect();
    rows.sort_by(|a, b| directional_cmp(by, a.value(by), b.value(by)));
    rows
}

fn directional_cmp(metric: Metric, x: f64, y: f64) -> Ordering {
    match metric.family() {
        MetricFamily::Latency => x.total_cmp(&y),
        MetricFamily::Throughput => y.total_cmp(&x),
    }
}

pub fn format_percent(value: f64) -> String {
    if value.is_nan() {
        return "N/A".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+inf%" } else { "-inf%" }.to_string();
    }
    let sign = if value > 0.0 {
        "+"
    } else if value < 0.0 {
        "-"
    } else {
        ""
    };
    format!("{sign}{:.1}%", value.abs())
}

const SLIGHT_THRESHOLD: f64 = 2.0;
const MODERATE_THRESHOLD: f64 = 5.0;
const SIGNIFICANT_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    None,
    Slight,
    Moderate,
    Significant,
}

impl Magnitude {
    pub fn of(change: f64) -> Self {
        let abs = change.abs();
        if abs > SIGNIFICANT_THRESHOLD {
            Self::Significant
        } else if abs > MODERATE_THRESHOLD {
            Self::Moderate
        } else if abs > SLIGHT_THRESHOLD {
            Self::Slight
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "no",
            Self::Slight => "slight",
            Self::Moderate => "moderate",
            Self::Significant => "significant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Improvement,
    Regression,
    Mixed,
    NoSignificantChange,
    NoData,
}

/// Averages of the finite p90 and rps percent changes across all results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSummary {
    pub endpoints: usize,
    pub avg_rps_change: f64,
    pub avg_latency_change: f64,
    pub rps_improved: usize,
    pub rps_worsened: usize,
    pub latency_improved: usize,
    pub latency_worsened: usize,
    pub verdict: Verdict,
    pub magnitude: Magnitude,
}

fn finite_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub fn summarize(results: &[ComparisonResult]) -> ComparisonSummary {
    let rps: Vec<f64> = results.iter().map(|r| r.percent_change.rps).collect();
    let p90: Vec<f64> = results.iter().map(|r| r.percent_change.p90).collect();
    let rps_improved = rps.iter().filter(|v| **v > SLIGHT_THRESHOLD).count();
    let rps_worsened = rps.iter().filter(|v| **v < -SLIGHT_THRESHOLD).count();
    let latency_improved = p90.iter().filter(|v| **v < -SLIGHT_THRESHOLD).count();
    let latency_worsened = p90.iter().filter(|v| **v > SLIGHT_THRESHOLD).count();
    let avg_rps_change = finite_mean(rps.iter().copied());
    let avg_latency_change = finite_mean(p90.iter().copied());

    let rps_up = avg_rps_change > SLIGHT_THRESHOLD;
    let rps_down = avg_rps_change < -SLIGHT_THRESHOLD;
    let lat_down = avg_latency_change < -SLIGHT_THRESHOLD;
    let lat_up = avg_latency_change > SLIGHT_THRESHOLD;

    let verdict = if results.is_empty() {
        Verdict::NoData
    } else if (rps_up && lat_up) || (rps_down && lat_down) {
        Verdict::Mixed
    } else if rps_up || lat_down {
        Verdict::Improvement
    } else if rps_down || lat_up {
        Verdict::Regression
    } else {
        Verdict::NoSignificantChange
    };
    let magnitude = Magnitude::of(avg_rps_change.abs().max(avg_latency_change.abs()));

    ComparisonSummary {
        endpoints: results.len(),
        avg_rps_change,
        avg_latency_change,
        rps_improved,
        rps_worsened,
        latency_improved,
        latency_worsened,
        verdict,
        magnitude,
    }
}

impl ComparisonSummary {
    /// One plain-text sentence describing the overall outcome.
    pub fn sentence(&self) -> String {
        let rps = format!(
            "RPS {} {:.0}%",
            if self.avg_rps_change >= 0.0 { "up" } else { "down" },
            self.avg_rps_change.abs()
        );
        let latency = format!(
            "p90 latency {} {:.0}%",
            if self.avg_latency_change <= 0.0 { "down" } else { "up" },
            self.avg_latency_change.abs()
        );
        match self.verdict {
            Verdict::NoData => "No comparison data available to generate a summary.".to_string(),
            Verdict::Improvement => format!(
                "This benchmark shows a {} improvement, with average {rps} and {latency}.",
                self.magnitude.as_str()
            ),
            Verdict::Regression => format!(
                "This benchmark shows a {} performance regression, with average {rps} and {latency}.",
                self.magnitude.as_str()
            ),
            Verdict::Mixed => format!("This benchmark shows mixed results: average {rps} and {latency}."),
            Verdict::NoSignificantChange => {
                "This benchmark shows no significant change in overall performance.".to_string()
            }
        }
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::BenchError;

/// Performance grade, ordered best to worst so that `max` picks the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Grade {
    #[default]
    #[serde(alias = "excellent")]
    Excellent,
    #[serde(alias = "good")]
    Good,
    #[serde(alias = "acceptable")]
    Acceptable,
    #[serde(rename = "Needs Improvement", alias = "needs_improvement", alias = "NeedsImprovement")]
    NeedsImprovement,
}

impl Grade {
    pub const ALL: [Grade; 4] = [
        Grade::Excellent,
        Grade::Good,
        Grade::Acceptable,
        Grade::NeedsImprovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Acceptable => "Acceptable",
            Self::NeedsImprovement => "Needs Improvement",
        }
    }

    /// True when `self` ranks strictly worse than `other`.
    pub fn is_worse_than(&self, other: Grade) -> bool {
        *self > other
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "acceptable" => Ok(Self::Acceptable),
            "needsimprovement" => Ok(Self::NeedsImprovement),
            _ => Err(BenchError::config(format!(
                "unknown grade '{s}' (expected Excellent, Good, Acceptable or Needs Improvement)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    /// Lower is better.
    Latency,
    /// Higher is better.
    Throughput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    P50,
    P90,
    P99,
    Rps,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::P50, Metric::P90, Metric::P99, Metric::Rps];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P50 => "p50",
            Self::P90 => "p90",
            Self::P99 => "p99",
            Self::Rps => "rps",
        }
    }

    pub fn family(&self) -> MetricFamily {
        match self {
            Self::Rps => MetricFamily::Throughput,
            _ => MetricFamily::Latency,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p50" => Ok(Self::P50),
            "p90" => Ok(Self::P90),
            "p99" => Ok(Self::P99),
            "rps" => Ok(Self::Rps),
            other => Err(BenchError::config(format!(
                "unknown metric '{other}' (expected p50, p90, p99 or rps)"
            ))),
        }
    }
}

/// One unit of benchmarking work derived from an API document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub method: String,
    /// Path template as written in the document, before parameter substitution.
    pub path: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl Scenario {
    pub fn key(&self) -> String {
        endpoint_key(&self.method, &self.path)
    }
}

pub fn endpoint_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), path)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Latency {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Aggregated result of one load test, as reported by a load executor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Milliseconds.
    pub latency: Latency,
    /// Average completed requests per second.
    pub rps: f64,
    pub errors: u64,
    pub requests: u64,
    pub non_2xx: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Grades {
    pub p50: Grade,
    pub p90: Grade,
    pub p99: Grade,
    pub rps: Grade,
    #[serde(rename = "final")]
    pub final_grade: Grade,
}

impl Grades {
    pub fn get(&self, metric: Metric) -> Grade {
        match metric {
            Metric::P50 => self.p50,
            Metric::P90 => self.p90,
            Metric::P99 => self.p99,
            Metric::Rps => self.rps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub method: String,
    pub path: String,
    pub rps: f64,
    pub latency: Latency,
    pub errors: u64,
    pub grades: Grades,
}

impl EndpointMetrics {
    pub fn key(&self) -> String {
        endpoint_key(&self.method, &self.path)
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::P50 => self.latency.p50,
            Metric::P90 => self.latency.p90,
            Metric::P99 => self.latency.p99,
            Metric::Rps => self.rps,
        }
    }
}

pub type Endpoints = IndexMap<String, EndpointMetrics>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub label: String,
    /// RFC 3339 capture time.
    pub timestamp: String,
    pub endpoints: Endpoints,
    pub final_grade: Grade,
}

/// Timestamp in the report format: UTC, millisecond precision, `Z` suffix.
pub fn capture_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricDeltas {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub rps: f64,
}

impl MetricDeltas {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::P50 => self.p50,
            Metric::P90 => self.p90,
            Metric::P99 => self.p99,
            Metric::Rps => self.rps,
        }
    }
}

/// Percent changes; non-finite values travel as `"+inf"`, `"-inf"` or `"NaN"` strings in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PercentChange {
    #[serde(with = "serde_percent")]
    pub p50: f64,
    #[serde(with = "serde_percent")]
    pub p90: f64,
    #[serde(with = "serde_percent")]
    pub p99: f64,
    #[serde(with = "serde_percent")]
    pub rps: f64,
}

impl PercentChange {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::P50 => self.p50,
            Metric::P90 => self.p90,
            Metric::P99 => self.p99,
            Metric::Rps => self.rps,
        }
    }
}

mod serde_percent {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(v: &f64, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if v.is_finite() {
            s.serialize_f64(*v)
        } else if v.is_nan() {
            s.serialize_str("NaN")
        } else if *v > 0.0 {
            s.serialize_str("+inf")
        } else {
            s.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D>(d: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(d)?;
        match v {
            serde_json::Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| serde::de::Error::custom("percent change out of range")),
            serde_json::Value::String(s) => match s.as_str() {
                "+inf" | "inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!(
                    "invalid percent change: {other}"
                ))),
            },
            other => Err(serde::de::Error::custom(format!(
                "percent change must be a number or +inf/-inf, got: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub method: String,
    pub path: String,
    pub baseline: EndpointMetrics,
    pub target: EndpointMetrics,
    pub delta: MetricDeltas,
    pub percent_change: PercentChange,
}

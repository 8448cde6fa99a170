//! Grading: classify one metric value against its bounds, aggregate grades.
//!
//! Classification is a pure step function. Latency grades use strict `<`,
//! throughput grades strict `>`, so a value exactly on a bound falls to the
//! next worse grade.

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};
use crate::model::{EndpointMetrics, Endpoints, Grade, Grades, Latency, Metric, MetricFamily};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    #[serde(rename = "Excellent", alias = "excellent")]
    pub excellent: f64,
    #[serde(rename = "Good", alias = "good")]
    pub good: f64,
    #[serde(rename = "Acceptable", alias = "acceptable")]
    pub acceptable: f64,
}

impl GradeThresholds {
    pub const fn new(excellent: f64, good: f64, acceptable: f64) -> Self {
        Self {
            excellent,
            good,
            acceptable,
        }
    }

    /// Bounds must step monotonically in the metric's "worse" direction.
    pub fn validate(&self, metric: Metric) -> Result<()> {
        let values = [self.excellent, self.good, self.acceptable];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BenchError::config(format!(
                "{metric} thresholds must be finite numbers, got {}",
                self.describe()
            )));
        }
        let ordered = match metric.family() {
            MetricFamily::Latency => self.excellent < self.good && self.good < self.acceptable,
            MetricFamily::Throughput => self.excellent > self.good && self.good > self.acceptable,
        };
        if !ordered {
            let expected = match metric.family() {
                MetricFamily::Latency => "increasing",
                MetricFamily::Throughput => "decreasing",
            };
            return Err(BenchError::config(format!(
                "{metric} thresholds must be strictly {expected} (excellent,good,acceptable), got {}",
                self.describe()
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{},{},{}", self.excellent, self.good, self.acceptable)
    }
}

pub const DEFAULT_P50: GradeThresholds = GradeThresholds::new(50.0, 150.0, 300.0);
pub const DEFAULT_P90: GradeThresholds = GradeThresholds::new(100.0, 300.0, 500.0);
pub const DEFAULT_P99: GradeThresholds = GradeThresholds::new(200.0, 500.0, 1000.0);
pub const DEFAULT_RPS: GradeThresholds = GradeThresholds::new(100.0, 20.0, 10.0);

/// One set of bounds per metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub p50: GradeThresholds,
    pub p90: GradeThresholds,
    pub p99: GradeThresholds,
    pub rps: GradeThresholds,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            p50: DEFAULT_P50,
            p90: DEFAULT_P90,
            p99: DEFAULT_P99,
            rps: DEFAULT_RPS,
        }
    }
}

impl ThresholdSet {
    pub fn get(&self, metric: Metric) -> &GradeThresholds {
        match metric {
            Metric::P50 => &self.p50,
            Metric::P90 => &self.p90,
            Metric::P99 => &self.p99,
            Metric::Rps => &self.rps,
        }
    }

    pub fn set(&mut self, metric: Metric, thresholds: GradeThresholds) {
        match metric {
            Metric::P50 => self.p50 = thresholds,
            Metric::P90 => self.p90 = thresholds,
            Metric::P99 => self.p99 = thresholds,
            Metric::Rps => self.rps = thresholds,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for metric in Metric::ALL {
            self.get(metric).validate(metric)?;
        }
        Ok(())
    }
}

/// Sparse per-metric overrides; one of these per configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p50: Option<GradeThresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p90: Option<GradeThresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99: Option<GradeThresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rps: Option<GradeThresholds>,
}

impl ThresholdOverrides {
    pub fn get(&self, metric: Metric) -> Option<GradeThresholds> {
        match metric {
            Metric::P50 => self.p50,
            Metric::P90 => self.p90,
            Metric::P99 => self.p99,
            Metric::Rps => self.rps,
        }
    }

    pub fn insert(&mut self, metric: Metric, thresholds: GradeThresholds) {
        match metric {
            Metric::P50 => self.p50 = Some(thresholds),
            Metric::P90 => self.p90 = Some(thresholds),
            Metric::P99 => self.p99 = Some(thresholds),
            Metric::Rps => self.rps = Some(thresholds),
        }
    }
}

/// Merge layers in order over the built-in defaults; later layers win.
pub fn resolve_thresholds(layers: &[ThresholdOverrides]) -> Result<ThresholdSet> {
    let mut set = ThresholdSet::default();
    for layer in layers {
        for metric in Metric::ALL {
            if let Some(t) = layer.get(metric) {
                set.set(metric, t);
            }
        }
    }
    set.validate()?;
    Ok(set)
}

/// Parse `excellent,good,acceptable`.
pub fn parse_range(value: &str) -> Result<GradeThresholds> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(BenchError::config(format!(
            "grade range '{value}' must have exactly three comma-separated numbers (excellent,good,acceptable)"
        )));
    }
    let mut nums = [0.0f64; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| {
                BenchError::config(format!("grade range '{value}' contains non-number '{part}'"))
            })?;
    }
    Ok(GradeThresholds::new(nums[0], nums[1], nums[2]))
}

/// Parse the combined form `p90=100,300,500;rps=100,20,10`.
pub fn parse_grade_range(value: &str) -> Result<ThresholdOverrides> {
    let mut out = ThresholdOverrides::default();
    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (metric, range) = entry.split_once('=').ok_or_else(|| {
            BenchError::config(format!(
                "grade range entry '{entry}' must look like metric=excellent,good,acceptable"
            ))
        })?;
        let metric: Metric = metric.parse()?;
        out.insert(metric, parse_range(range)?);
    }
    Ok(out)
}

pub fn classify(metric: Metric, value: f64, thresholds: &GradeThresholds) -> Grade {
    match metric.family() {
        MetricFamily::Throughput => {
            if value > thresholds.excellent {
                Grade::Excellent
            } else if value > thresholds.good {
                Grade::Good
            } else if value > thresholds.acceptable {
                Grade::Acceptable
            } else {
                Grade::NeedsImprovement
            }
        }
        MetricFamily::Latency => {
            if value < thresholds.excellent {
                Grade::Excellent
            } else if value < thresholds.good {
                Grade::Good
            } else if value < thresholds.acceptable {
                Grade::Acceptable
            } else {
                Grade::NeedsImprovement
            }
        }
    }
}

/// Worst grade wins; an empty input grades as Excellent.
pub fn aggregate<I>(grades: I) -> Grade
where
    I: IntoIterator<Item = Grade>,
{
    grades.into_iter().max().unwrap_or(Grade::Excellent)
}

pub fn grade_metrics(latency: &Latency, rps: f64, thresholds: &ThresholdSet) -> Grades {
    let p50 = classify(Metric::P50, latency.p50, &thresholds.p50);
    let p90 = classify(Metric::P90, latency.p90, &thresholds.p90);
    let p99 = classify(Metric::P99, latency.p99, &thresholds.p99);
    let rps = classify(Metric::Rps, rps, &thresholds.rps);
    Grades {
        p50,
        p90,
        p99,
        rps,
        final_grade: aggregate([p50, p90, p99, rps]),
    }
}

pub fn aggregate_endpoints(endpoints: &Endpoints) -> Grade {
    aggregate(endpoints.values().map(|e: &EndpointMetrics| e.grades.final_grade))
}

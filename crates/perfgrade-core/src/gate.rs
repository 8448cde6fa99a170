use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};
use crate::model::{EndpointMetrics, Grade, Measurement, Scenario};

/// Hard-fail limits checked after every scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Upper bound on p90 latency, in milliseconds.
    #[serde(default)]
    pub latency_ceiling_ms: Option<f64>,
    #[serde(default)]
    pub throughput_floor_rps: Option<f64>,
    /// Worst acceptable endpoint final grade.
    #[serde(default)]
    pub min_grade: Option<Grade>,
}

impl GateConfig {
    pub fn is_empty(&self) -> bool {
        self.latency_ceiling_ms.is_none()
            && self.throughput_floor_rps.is_none()
            && self.min_grade.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("latency threshold", self.latency_ceiling_ms),
            ("throughput threshold", self.throughput_floor_rps),
        ] {
            if let Some(v) = v {
                if !v.is_finite() || v < 0.0 {
                    return Err(BenchError::config(format!(
                        "{name} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Raw latency and throughput limits against one scenario's measurement.
    pub fn check_measurement(&self, scenario: &Scenario, m: &Measurement) -> Result<()> {
        if let Some(ceiling) = self.latency_ceiling_ms {
            if m.latency.p90 > ceiling {
                return Err(BenchError::ThresholdViolation {
                    endpoint: scenario.key(),
                    message: format!(
                        "p90 latency {:.2} ms exceeds the {ceiling} ms ceiling",
                        m.latency.p90
                    ),
                });
            }
        }
        if let Some(floor) = self.throughput_floor_rps {
            if m.rps < floor {
                return Err(BenchError::ThresholdViolation {
                    endpoint: scenario.key(),
                    message: format!(
                        "throughput {:.2} req/s is below the {floor} req/s floor",
                        m.rps
                    ),
                });
            }
        }
        Ok(())
    }

    /// Minimum-grade check against a recorded endpoint.
    pub fn check_grade(&self, endpoint: &EndpointMetrics) -> Result<()> {
        let Some(min) = self.min_grade else {
            return Ok(());
        };
        let grade = endpoint.grades.final_grade;
        if grade.is_worse_than(min) {
            return Err(BenchError::ThresholdViolation {
                endpoint: endpoint.key(),
                message: format!("final grade {grade} is worse than the required {min}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Grades, Latency};

    fn scenario() -> Scenario {
        Scenario {
            method: "GET".into(),
            path: "/pets".into(),
            url: "http://h/pets".into(),
            headers: None,
            body: None,
            operation_id: None,
        }
    }

    fn measurement(p90: f64, rps: f64) -> Measurement {
        Measurement {
            latency: Latency {
                p50: p90 / 2.0,
                p90,
                p99: p90 * 2.0,
            },
            rps,
            ..Default::default()
        }
    }

    #[test]
    fn latency_ceiling_uses_p90() {
        let gate = GateConfig {
            latency_ceiling_ms: Some(100.0),
            ..Default::default()
        };
        assert!(gate.check_measurement(&scenario(), &measurement(100.0, 1.0)).is_ok());
        let err = gate
            .check_measurement(&scenario(), &measurement(150.0, 1.0))
            .unwrap_err();
        match err {
            BenchError::ThresholdViolation { endpoint, message } => {
                assert_eq!(endpoint, "GET /pets");
                assert!(message.contains("150.00"));
                assert!(message.contains("100"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn throughput_floor() {
        let gate = GateConfig {
            throughput_floor_rps: Some(50.0),
            ..Default::default()
        };
        assert!(gate.check_measurement(&scenario(), &measurement(1.0, 50.0)).is_ok());
        assert!(gate.check_measurement(&scenario(), &measurement(1.0, 49.9)).is_err());
    }

    #[test]
    fn min_grade_rejects_worse() {
        let gate = GateConfig {
            min_grade: Some(Grade::Good),
            ..Default::default()
        };
        let mut ep = EndpointMetrics {
            method: "GET".into(),
            path: "/pets".into(),
            rps: 10.0,
            latency: Latency::default(),
            errors: 0,
            grades: Grades {
                final_grade: Grade::Good,
                ..Default::default()
            },
        };
        assert!(gate.check_grade(&ep).is_ok());
        ep.grades.final_grade = Grade::Acceptable;
        assert!(gate.check_grade(&ep).is_err());
    }

    #[test]
    fn negative_limits_rejected() {
        let gate = GateConfig {
            latency_ceiling_ms: Some(-1.0),
            ..Default::default()
        };
        assert!(gate.validate().is_err());
        assert!(GateConfig::default().is_empty());
    }
}

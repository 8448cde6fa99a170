use std::sync::OnceLock;

use jsonschema::Draft;
use serde_json::Value;

use crate::errors::{BenchError, Result};

const REPORT_V1_SCHEMA_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/report_v1.schema.json"
));

static VALIDATOR: OnceLock<std::result::Result<jsonschema::Validator, String>> = OnceLock::new();

fn compiled_validator() -> Result<&'static jsonschema::Validator> {
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(REPORT_V1_SCHEMA_JSON)
                .map_err(|e| format!("failed to parse embedded report_v1 schema JSON: {e}"))?;
            jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&schema)
                .map_err(|e| format!("failed to compile report_v1 schema: {e}"))
        })
        .as_ref()
        .map_err(|e| BenchError::report_format(e.clone()))
}

/// Validate a report document against the embedded report_v1 schema.
///
/// The error lists the first few violations.
pub fn validate_report_v1(instance: &Value) -> Result<()> {
    let v = compiled_validator()?;
    if v.is_valid(instance) {
        return Ok(());
    }

    const MAX_ERRORS: usize = 5;
    let lines: Vec<String> = v
        .iter_errors(instance)
        .take(MAX_ERRORS)
        .map(|e| e.to_string())
        .collect();
    Err(BenchError::report_format(format!(
        "report does not match schema: {}",
        lines.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_compiles() {
        assert!(compiled_validator().is_ok());
    }

    #[test]
    fn empty_object_is_invalid() {
        assert!(validate_report_v1(&json!({})).is_err());
    }

    #[test]
    fn grades_are_optional() {
        let report = json!({
            "label": "base",
            "timestamp": "2024-01-01T00:00:00.000Z",
            "endpoints": {
                "GET /pets": {
                    "method": "GET",
                    "path": "/pets",
                    "rps": 120.5,
                    "errors": 0,
                    "latency": {"p50": 10.0, "p90": 20.0, "p99": 30.0}
                }
            }
        });
        assert!(validate_report_v1(&report).is_ok());
    }

    #[test]
    fn non_numeric_latency_is_rejected() {
        let report = json!({
            "label": "base",
            "timestamp": "t",
            "endpoints": {
                "GET /pets": {
                    "method": "GET",
                    "path": "/pets",
                    "rps": 1,
                    "latency": {"p50": "fast", "p90": 1, "p99": 1}
                }
            }
        });
        let err = validate_report_v1(&report).unwrap_err().to_string();
        assert!(err.contains("fast"), "{err}");
    }
}

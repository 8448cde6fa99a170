use serde_json::Value;

use super::schema::validate_report_v1;
use super::LoadedReport;
use crate::errors::{BenchError, Result};
use crate::model::{ComparisonResult, Report};

pub fn render_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| BenchError::report_format(format!("serialising report: {e}")))
}

pub fn render_comparison(results: &[ComparisonResult]) -> Result<String> {
    serde_json::to_string_pretty(results)
        .map_err(|e| BenchError::report_format(format!("serialising comparison: {e}")))
}

/// Parse and schema-validate a JSON report.
pub fn parse_report(raw: &str) -> Result<LoadedReport> {
    let value: Value = serde_json::from_str(raw).map_err(|e| BenchError::ReportFormat {
        message: format!("invalid JSON at column {}: {e}", e.column()),
        line: Some(e.line()),
    })?;
    validate_report_v1(&value)?;
    serde_json::from_value(value)
        .map_err(|e| BenchError::report_format(format!("invalid report: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare_reports;
    use crate::errors::BenchErrorKind;
    use crate::grade::ThresholdSet;
    use crate::report::fixtures;

    #[test]
    fn report_uses_camel_case_and_two_space_indent() {
        let report = fixtures::report("base", vec![fixtures::endpoint("GET", "/a", 150.0, 80.0)]);
        let out = render_report(&report).unwrap();
        assert!(out.contains("\n  \"finalGrade\": \"Excellent\""));
        assert!(out.contains("\"GET /a\""));
    }

    #[test]
    fn syntax_error_reports_line() {
        let err = parse_report("{\n  \"label\": \"x\",\n  oops\n}").unwrap_err();
        assert_eq!(err.kind(), BenchErrorKind::ReportFormat);
        assert!(matches!(err, BenchError::ReportFormat { line: Some(3), .. }));
    }

    #[test]
    fn missing_fields_fail_schema() {
        let err = parse_report(r#"{"label": "x", "endpoints": {}}"#).unwrap_err();
        assert!(err.to_string().contains("timestamp"), "{err}");
    }

    #[test]
    fn parsed_report_keeps_endpoint_order() {
        let report = fixtures::report(
            "base",
            vec![
                fixtures::endpoint("GET", "/z", 1.0, 1.0),
                fixtures::endpoint("GET", "/a", 1.0, 1.0),
            ],
        );
        let back = parse_report(&render_report(&report).unwrap())
            .unwrap()
            .finalize(&ThresholdSet::default());
        let keys: Vec<_> = back.endpoints.keys().cloned().collect();
        assert_eq!(keys, vec!["GET /z", "GET /a"]);
    }

    #[test]
    fn comparison_is_an_array_with_percent_change() {
        let base = fixtures::report("b", vec![fixtures::endpoint("GET", "/a", 100.0, 100.0)]);
        let target = fixtures::report("t", vec![fixtures::endpoint("GET", "/a", 200.0, 50.0)]);
        let out = render_comparison(&compare_reports(&base, &target)).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v[0]["percentChange"]["rps"], 100.0);
        assert_eq!(v[0]["percentChange"]["p90"], -100.0);
    }
}

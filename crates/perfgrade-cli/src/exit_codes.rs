//! Process exit codes. Part of the public contract for CI pipelines.

use perfgrade_core::{BenchError, BenchErrorKind};

pub const SUCCESS: i32 = 0;
pub const THRESHOLD_VIOLATION: i32 = 1; // A gate (latency, throughput or grade) failed
pub const CONFIG_ERROR: i32 = 2; // Bad flags, config file or report file
pub const RESOLUTION_ERROR: i32 = 3; // API document or base URL could not be resolved
pub const RUNTIME_ERROR: i32 = 4; // Hook, executor or I/O failure

pub fn for_kind(kind: BenchErrorKind) -> i32 {
    match kind {
        BenchErrorKind::ThresholdViolation => THRESHOLD_VIOLATION,
        BenchErrorKind::Configuration | BenchErrorKind::ReportFormat => CONFIG_ERROR,
        BenchErrorKind::SpecResolution | BenchErrorKind::BaseUrlResolution => RESOLUTION_ERROR,
        BenchErrorKind::PluginLoad
        | BenchErrorKind::Hook
        | BenchErrorKind::Executor
        | BenchErrorKind::Io => RUNTIME_ERROR,
    }
}

pub fn for_error(err: &BenchError) -> i32 {
    for_kind(err.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_a_documented_code() {
        let cases = [
            (BenchErrorKind::Configuration, 2),
            (BenchErrorKind::ReportFormat, 2),
            (BenchErrorKind::SpecResolution, 3),
            (BenchErrorKind::BaseUrlResolution, 3),
            (BenchErrorKind::ThresholdViolation, 1),
            (BenchErrorKind::Hook, 4),
            (BenchErrorKind::Executor, 4),
            (BenchErrorKind::Io, 4),
            (BenchErrorKind::PluginLoad, 4),
        ];
        for (kind, code) in cases {
            assert_eq!(for_kind(kind), code, "{}", kind.as_str());
        }
    }

    #[test]
    fn threshold_error_exits_with_one() {
        let err = BenchError::ThresholdViolation {
            endpoint: "GET /pets".into(),
            message: "p90 latency 150.00 ms exceeds the 100 ms ceiling".into(),
        };
        assert_eq!(for_error(&err), THRESHOLD_VIOLATION);
    }
}

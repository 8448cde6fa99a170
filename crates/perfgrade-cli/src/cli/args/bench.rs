//! Bench command arguments.

use std::path::PathBuf;

use perfgrade_core::model::Metric;
use perfgrade_core::FlagOverrides;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct BenchArgs {
    /// API document: http(s) URL or local JSON/YAML file
    #[arg(conflicts_with = "spec_flag")]
    pub spec: Option<String>,

    #[arg(short = 's', long = "spec", value_name = "SPEC")]
    pub spec_flag: Option<String>,

    /// Base URL of the service under test (required for a local spec file)
    #[arg(short = 'u', long, env = "PERFGRADE_URL")]
    pub url: Option<String>,

    /// Concurrent connections per scenario
    #[arg(short = 'c', long)]
    pub connections: Option<usize>,

    /// Seconds per scenario
    #[arg(short = 'd', long, value_name = "SECS")]
    pub duration: Option<u64>,

    #[arg(long, value_name = "E,G,A")]
    pub p50_range: Option<String>,

    #[arg(long, value_name = "E,G,A")]
    pub p90_range: Option<String>,

    #[arg(long, value_name = "E,G,A")]
    pub p99_range: Option<String>,

    #[arg(long, value_name = "E,G,A")]
    pub rps_range: Option<String>,

    /// Combined thresholds, e.g. "p90=100,300,500;rps=100,20,10"
    #[arg(long)]
    pub grade_range: Option<String>,

    /// Fail when any endpoint grades worse than this
    #[arg(long, value_name = "GRADE")]
    pub grade_threshold: Option<String>,

    /// Fail when an endpoint's p90 latency exceeds this many milliseconds
    #[arg(long, value_name = "MS")]
    pub latency_threshold: Option<f64>,

    /// Fail when an endpoint's throughput drops below this many requests per second
    #[arg(long, value_name = "RPS")]
    pub throughput_threshold: Option<f64>,

    #[arg(long)]
    pub label: Option<String>,

    /// Second source: a base URL to benchmark, or a saved report file
    #[arg(short = 'w', long, value_name = "SRC")]
    pub compare_with: Option<String>,

    #[arg(long)]
    pub compare_label: Option<String>,

    /// Write the report to a file (.json, .csv or .html)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Plugin manifest (repeatable)
    #[arg(short = 'p', long = "plugin", value_name = "PLUGIN")]
    pub plugins: Vec<PathBuf>,

    /// Path parameter value, `name=value` (repeatable)
    #[arg(long = "param", value_name = "K=V")]
    pub params: Vec<String>,

    /// Skip endpoints matching a glob on "METHOD /path" or "/path" (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub skip: Vec<String>,

    #[arg(long)]
    pub sort_by: Option<Metric>,

    #[arg(long, env = "PERFGRADE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl BenchArgs {
    pub fn into_overrides(self) -> (Option<PathBuf>, FlagOverrides) {
        let flags = FlagOverrides {
            spec: self.spec.or(self.spec_flag),
            url: self.url,
            connections: self.connections,
            duration_secs: self.duration,
            p50_range: self.p50_range,
            p90_range: self.p90_range,
            p99_range: self.p99_range,
            rps_range: self.rps_range,
            grade_range: self.grade_range,
            grade_threshold: self.grade_threshold,
            latency_threshold: self.latency_threshold,
            throughput_threshold: self.throughput_threshold,
            label: self.label,
            compare_with: self.compare_with,
            compare_label: self.compare_label,
            output: self.output,
            plugins: self.plugins,
            params: self.params,
            skip: self.skip,
            sort_by: self.sort_by,
        };
        (self.config, flags)
    }
}

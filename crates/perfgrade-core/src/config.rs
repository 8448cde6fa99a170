//! Benchmark configuration: optional `perfgrade.yaml`, layered under command-line flags.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{BenchError, Result};
use crate::executor::{LoadOptions, DEFAULT_CONNECTIONS, DEFAULT_DURATION};
use crate::gate::GateConfig;
use crate::grade::{parse_grade_range, parse_range, resolve_thresholds, ThresholdOverrides, ThresholdSet};
use crate::model::Metric;
use crate::scenario::parse_param_overrides;

pub const DEFAULT_CONFIG_FILE: &str = "perfgrade.yaml";
pub const DEFAULT_LABEL: &str = "Baseline Report";
pub const DEFAULT_COMPARE_LABEL: &str = "Comparison Report";

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub connections: Option<usize>,
    /// Seconds per scenario.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub compare_label: Option<String>,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub plugins: Vec<PathBuf>,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub sort_by: Option<Metric>,
}

impl ConfigFile {
    pub fn parse(raw: &str, origin: &Path) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|e| BenchError::config(format!("{}: {e}", origin.display())))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BenchError::config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let cfg = Self::parse(&raw, path)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(cfg)
    }

    /// An explicit path must exist; otherwise `perfgrade.yaml` in `dir` is used when present.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Option<Self>> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }
        let default = dir.join(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            return Self::load(&default).map(Some);
        }
        Ok(None)
    }
}

/// Values given on the command line. `None` / empty means "not given".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagOverrides {
    pub spec: Option<String>,
    pub url: Option<String>,
    pub connections: Option<usize>,
    pub duration_secs: Option<u64>,
    pub p50_range: Option<String>,
    pub p90_range: Option<String>,
    pub p99_range: Option<String>,
    pub rps_range: Option<String>,
    pub grade_range: Option<String>,
    pub grade_threshold: Option<String>,
    pub latency_threshold: Option<f64>,
    pub throughput_threshold: Option<f64>,
    pub label: Option<String>,
    pub compare_with: Option<String>,
    pub compare_label: Option<String>,
    pub output: Option<PathBuf>,
    pub plugins: Vec<PathBuf>,
    pub params: Vec<String>,
    pub skip: Vec<String>,
    pub sort_by: Option<Metric>,
}

/// Effective settings for one orchestrator run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub spec: Option<String>,
    pub url: Option<String>,
    pub load: LoadOptions,
    pub thresholds: ThresholdSet,
    pub gate: GateConfig,
    pub label: String,
    pub compare_with: Option<String>,
    pub compare_label: String,
    pub output: Option<PathBuf>,
    pub plugins: Vec<PathBuf>,
    pub params: HashMap<String, String>,
    pub skip: Vec<String>,
    pub sort_by: Metric,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            spec: None,
            url: None,
            load: LoadOptions::default(),
            thresholds: ThresholdSet::default(),
            gate: GateConfig::default(),
            label: DEFAULT_LABEL.to_string(),
            compare_with: None,
            compare_label: DEFAULT_COMPARE_LABEL.to_string(),
            output: None,
            plugins: Vec::new(),
            params: HashMap::new(),
            skip: Vec::new(),
            sort_by: Metric::default(),
        }
    }
}

impl BenchConfig {
    /// Layer defaults, then the config file, then flags.
    ///
    /// Threshold precedence within the flags: the combined `--grade-range`
    /// string first, then the per-metric `--pXX-range` values.
    pub fn resolve(file: Option<ConfigFile>, flags: FlagOverrides) -> Result<Self> {
        let file = file.unwrap_or_default();

        let mut range_flags = ThresholdOverrides::default();
        for (metric, value) in [
            (Metric::P50, &flags.p50_range),
            (Metric::P90, &flags.p90_range),
            (Metric::P99, &flags.p99_range),
            (Metric::Rps, &flags.rps_range),
        ] {
            if let Some(v) = value {
                range_flags.insert(metric, parse_range(v)?);
            }
        }
        let combined = match &flags.grade_range {
            Some(v) => parse_grade_range(v)?,
            None => ThresholdOverrides::default(),
        };
        let thresholds = resolve_thresholds(&[file.thresholds.clone(), combined, range_flags])?;

        let mut gate = file.gate;
        if let Some(v) = flags.latency_threshold {
            gate.latency_ceiling_ms = Some(v);
        }
        if let Some(v) = flags.throughput_threshold {
            gate.throughput_floor_rps = Some(v);
        }
        if let Some(v) = &flags.grade_threshold {
            gate.min_grade = Some(v.parse()?);
        }
        gate.validate()?;

        let mut params: HashMap<String, String> = file.params.into_iter().collect();
        params.extend(parse_param_overrides(&flags.params)?);

        let mut plugins = file.plugins;
        plugins.extend(flags.plugins);
        let mut skip = file.skip;
        skip.extend(flags.skip);

        let load = LoadOptions {
            connections: flags
                .connections
                .or(file.connections)
                .unwrap_or(DEFAULT_CONNECTIONS),
            duration: flags
                .duration_secs
                .or(file.duration)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DURATION),
        };

        Ok(Self {
            spec: flags.spec,
            url: flags.url,
            load,
            thresholds,
            gate,
            label: flags
                .label
                .or(file.label)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            compare_with: flags.compare_with,
            compare_label: flags
                .compare_label
                .or(file.compare_label)
                .unwrap_or_else(|| DEFAULT_COMPARE_LABEL.to_string()),
            output: flags.output,
            plugins,
            params,
            skip,
            sort_by: flags.sort_by.or(file.sort_by).unwrap_or_default(),
        })
    }
}

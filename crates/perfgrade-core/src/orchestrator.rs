//! Sequences one benchmark invocation: verify arguments, resolve the base URL,
//! run or load each source, compare, and render.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compare::{compare_reports, sort_comparison};
use crate::config::BenchConfig;
use crate::errors::{BenchError, Result};
use crate::executor::{HttpLoadExecutor, LoadExecutor};
use crate::grade::{aggregate_endpoints, grade_metrics};
use crate::hooks::{HookEvent, HookRegistry, Plugin};
use crate::model::{capture_timestamp, ComparisonResult, EndpointMetrics, Endpoints, Report, Scenario};
use crate::plugins::load_plugins;
use crate::report::progress::{default_progress_sink, Progress, ProgressSink};
use crate::report::{self, console, ReportFormat};
use crate::scenario::{compile_scenarios, SkipFilter};
use crate::spec::{is_url, resolve_base_url, ApiDocument, DocumentResolver, SpecResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ArgsVerified,
    BaseUrlResolved,
    Running,
    Loaded,
    Compared,
    Rendered,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ArgsVerified => "args_verified",
            Self::BaseUrlResolved => "base_url_resolved",
            Self::Running => "running",
            Self::Loaded => "loaded",
            Self::Compared => "compared",
            Self::Rendered => "rendered",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Report(Report),
    Comparison {
        baseline: Report,
        target: Report,
        /// Sorted by the configured sort key.
        results: Vec<ComparisonResult>,
    },
}

impl RunOutcome {
    /// The report of the primary source.
    pub fn primary(&self) -> &Report {
        match self {
            Self::Report(r) => r,
            Self::Comparison { baseline, .. } => baseline,
        }
    }
}

pub struct Orchestrator {
    config: BenchConfig,
    executor: Arc<dyn LoadExecutor>,
    resolver: Arc<dyn SpecResolver>,
    hooks: HookRegistry,
    progress_sink: Option<ProgressSink>,
    console: Box<dyn Write + Send + Sync>,
    state: RunState,
    document: Option<ApiDocument>,
    plugins_loaded: bool,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config,
            executor: Arc::new(HttpLoadExecutor::new()),
            resolver: Arc::new(DocumentResolver::new()),
            hooks: HookRegistry::new(),
            progress_sink: Some(default_progress_sink()),
            console: Box::new(std::io::stdout()),
            state: RunState::Idle,
            document: None,
            plugins_loaded: false,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn LoadExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SpecResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// `None` disables progress output.
    pub fn with_progress_sink(mut self, sink: Option<ProgressSink>) -> Self {
        self.progress_sink = sink;
        self
    }

    /// Destination of the console views (stdout by default).
    pub fn with_console(mut self, console: Box<dyn Write + Send + Sync>) -> Self {
        self.console = console;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.hooks.register_plugin(plugin);
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn fail(&mut self, err: BenchError) -> BenchError {
        tracing::debug!(state = %self.state, kind = err.kind().as_str(), "run failed");
        self.transition(RunState::Failed);
        err
    }

    /// Full benchmark: live run of the primary source, optional second source, render.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        match self.run_inner().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_inner(&mut self) -> Result<RunOutcome> {
        self.verify_args()?;
        self.transition(RunState::ArgsVerified);

        let base_url = self.resolve_target().await?;
        self.transition(RunState::BaseUrlResolved);
        tracing::info!(base_url = %base_url, "resolved base URL");

        let label = self.config.label.clone();
        let primary = self.load_or_run(&base_url, &label).await?;

        let outcome = match self.config.compare_with.clone() {
            Some(second) => {
                let label = self.config.compare_label.clone();
                let target = self.load_or_run(&second, &label).await?;
                let mut results = compare_reports(&primary, &target);
                sort_comparison(&mut results, self.config.sort_by);
                self.transition(RunState::Compared);
                RunOutcome::Comparison {
                    baseline: primary,
                    target,
                    results,
                }
            }
            None => RunOutcome::Report(primary),
        };

        self.render(&outcome)?;
        self.transition(RunState::Rendered);
        self.transition(RunState::Done);
        Ok(outcome)
    }

    /// Compare two existing report files without resolving any API document.
    pub async fn compare_files(&mut self, baseline: &Path, target: &Path) -> Result<Vec<ComparisonResult>> {
        match self.compare_files_inner(baseline, target) {
            Ok(results) => Ok(results),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn compare_files_inner(&mut self, baseline: &Path, target: &Path) -> Result<Vec<ComparisonResult>> {
        if let Some(out) = &self.config.output {
            ReportFormat::from_path(out)?;
        }
        ReportFormat::from_path(baseline)?;
        ReportFormat::from_path(target)?;
        self.transition(RunState::ArgsVerified);

        let base = report::load_report(baseline, &self.config.thresholds)?;
        let tgt = report::load_report(target, &self.config.thresholds)?;
        self.transition(RunState::Loaded);

        let mut results = compare_reports(&base, &tgt);
        sort_comparison(&mut results, self.config.sort_by);
        self.transition(RunState::Compared);

        let outcome = RunOutcome::Comparison {
            baseline: base,
            target: tgt,
            results,
        };
        self.render(&outcome)?;
        self.transition(RunState::Rendered);
        self.transition(RunState::Done);
        match outcome {
            RunOutcome::Comparison { results, .. } => Ok(results),
            RunOutcome::Report(_) => Ok(Vec::new()),
        }
    }

    fn verify_args(&self) -> Result<()> {
        let c = &self.config;
        if let Some(out) = &c.output {
            ReportFormat::from_path(out)?;
        }
        if c.load.connections == 0 {
            return Err(BenchError::config("connections must be at least 1"));
        }
        if c.load.duration.is_zero() {
            return Err(BenchError::config("duration must be at least 1 second"));
        }
        if let Some(url) = &c.url {
            if !is_url(url) {
                return Err(BenchError::config(format!(
                    "--url '{url}' is not an http(s) URL"
                )));
            }
        }
        match &c.spec {
            None if c.compare_with.is_some() => {
                return Err(BenchError::config(
                    "--compare-with needs a baseline run: pass an API spec (and --url when the spec is a local file)",
                ));
            }
            None => {
                return Err(BenchError::config(
                    "no API spec given: pass a spec URL or file as SPEC or --spec",
                ));
            }
            Some(spec) if !is_url(spec) && c.url.is_none() => {
                return Err(BenchError::config(format!(
                    "spec '{spec}' is a local file; pass --url with the base URL of the API under test"
                )));
            }
            Some(_) => {}
        }
        if let Some(second) = &c.compare_with {
            if !is_url(second) {
                ReportFormat::from_path(Path::new(second))?;
            }
        }
        Ok(())
    }

    async fn ensure_document(&mut self) -> Result<()> {
        if self.document.is_none() {
            let spec = self
                .config
                .spec
                .clone()
                .ok_or_else(|| BenchError::SpecResolution("no API spec configured".into()))?;
            self.document = Some(self.resolver.resolve(&spec).await?);
        }
        Ok(())
    }

    fn document(&self) -> Result<&ApiDocument> {
        self.document
            .as_ref()
            .ok_or_else(|| BenchError::SpecResolution("API document unavailable".into()))
    }

    async fn resolve_target(&mut self) -> Result<String> {
        self.ensure_document().await?;
        resolve_base_url(
            self.config.url.as_deref(),
            Some(self.document()?),
            self.config.spec.as_deref(),
        )
    }

    async fn load_or_run(&mut self, source: &str, label: &str) -> Result<Report> {
        if is_url(source) {
            self.run_live(source, label).await
        } else {
            let report = report::load_report(Path::new(source), &self.config.thresholds)?;
            self.transition(RunState::Loaded);
            Ok(report)
        }
    }

    async fn run_live(&mut self, base_url: &str, label: &str) -> Result<Report> {
        let skip = SkipFilter::new(&self.config.skip)?;
        self.ensure_document().await?;
        let scenarios = compile_scenarios(self.document()?, &self.config.params, base_url, &skip)?;
        if !self.plugins_loaded {
            let paths: Vec<PathBuf> = self.config.plugins.clone();
            load_plugins(&mut self.hooks, &paths);
            self.plugins_loaded = true;
        }
        self.transition(RunState::Running);
        tracing::info!(
            base_url,
            scenarios = scenarios.len(),
            connections = self.config.load.connections,
            duration_secs = self.config.load.duration.as_secs(),
            "starting benchmark"
        );

        let mut endpoints = Endpoints::new();
        let outcome = self.execute_all(&scenarios, &mut endpoints).await;
        let after = self.hooks.fire(&HookEvent::AfterRun {
            scenarios: &scenarios,
            endpoints: &endpoints,
        });
        match (outcome, after) {
            (Ok(()), Ok(())) => {}
            (Err(e), Ok(())) | (Ok(()), Err(e)) => return Err(e),
            (Err(e), Err(hook_err)) => {
                tracing::warn!(error = %hook_err, "after_run hook failed while unwinding");
                return Err(e);
            }
        }

        let final_grade = aggregate_endpoints(&endpoints);
        Ok(Report {
            label: label.to_string(),
            timestamp: capture_timestamp(),
            endpoints,
            final_grade,
        })
    }

    async fn execute_all(&self, scenarios: &[Scenario], endpoints: &mut Endpoints) -> Result<()> {
        self.hooks.fire(&HookEvent::BeforeRun { scenarios })?;
        let mut progress = Progress::start(scenarios.len(), self.progress_sink.clone());

        for scenario in scenarios {
            let key = scenario.key();
            self.hooks.fire(&HookEvent::BeforeScenario { scenario })?;

            tracing::info!(endpoint = %key, url = %scenario.url, "benchmarking");
            let measurement = self
                .executor
                .execute(scenario, &self.config.load)
                .await
                .map_err(|e| BenchError::Executor {
                    endpoint: key.clone(),
                    message: format!("{e:#}"),
                })?;

            let grades = grade_metrics(&measurement.latency, measurement.rps, &self.config.thresholds);
            let recorded = EndpointMetrics {
                method: scenario.method.clone(),
                path: scenario.path.clone(),
                rps: measurement.rps,
                latency: measurement.latency,
                errors: measurement.errors,
                grades,
            };
            tracing::debug!(
                endpoint = %key,
                rps = measurement.rps,
                p90 = measurement.latency.p90,
                grade = %grades.final_grade,
                "recorded endpoint"
            );
            if measurement.errors > 0 {
                tracing::warn!(endpoint = %key, errors = measurement.errors, "requests failed");
            }
            endpoints.insert(key.clone(), recorded.clone());
            progress.advance(&key);

            self.hooks.fire(&HookEvent::AfterScenario {
                scenario,
                measurement: &measurement,
            })?;

            self.config.gate.check_measurement(scenario, &measurement)?;
            self.config.gate.check_grade(&recorded)?;
        }
        Ok(())
    }

    fn render(&mut self, outcome: &RunOutcome) -> Result<()> {
        let (baseline_label, target_label) = match outcome {
            RunOutcome::Comparison { baseline, target, .. } => {
                (baseline.label.as_str(), target.label.as_str())
            }
            RunOutcome::Report(r) => (r.label.as_str(), ""),
        };

        match self.config.output.clone() {
            Some(path) => {
                let format = ReportFormat::from_path(&path)?;
                let rendered = match outcome {
                    RunOutcome::Report(r) => report::render_report(r, format)?,
                    RunOutcome::Comparison { results, .. } => {
                        report::render_comparison(results, baseline_label, target_label, format)?
                    }
                };
                report::write_output(&path, &rendered)
            }
            None => {
                let rendered = match outcome {
                    RunOutcome::Report(r) => console::render_report(r, self.config.sort_by),
                    RunOutcome::Comparison { results, .. } => {
                        console::render_comparison(results, baseline_label, target_label)
                    }
                };
                self.console
                    .write_all(rendered.as_bytes())
                    .and_then(|_| self.console.flush())
                    .map_err(|e| BenchError::io("<stdout>", e))
            }
        }
    }
}

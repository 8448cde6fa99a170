use perfgrade_core::{BenchConfig, ConfigFile, Orchestrator, RunOutcome};

use super::super::args::BenchArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: BenchArgs) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let (config_path, flags) = args.into_overrides();

    let file = match ConfigFile::discover(config_path.as_deref(), &cwd) {
        Ok(file) => file,
        Err(e) => return Ok(super::report_failure(&e)),
    };
    let config = match BenchConfig::resolve(file, flags) {
        Ok(config) => config,
        Err(e) => return Ok(super::report_failure(&e)),
    };

    let mut orchestrator = Orchestrator::new(config);
    match orchestrator.run().await {
        Ok(outcome) => {
            let report = outcome.primary();
            tracing::info!(
                label = %report.label,
                endpoints = report.endpoints.len(),
                final_grade = %report.final_grade,
                compared = matches!(outcome, RunOutcome::Comparison { .. }),
                "benchmark complete"
            );
            if let Some(path) = &orchestrator.config().output {
                eprintln!("Report written to {}", path.display());
            }
            Ok(SUCCESS)
        }
        Err(e) => Ok(super::report_failure(&e)),
    }
}

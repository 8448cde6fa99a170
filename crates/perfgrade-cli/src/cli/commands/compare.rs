use perfgrade_core::compare::summarize;
use perfgrade_core::{BenchConfig, ConfigFile, FlagOverrides, Orchestrator};

use super::super::args::CompareArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: CompareArgs) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let flags = FlagOverrides {
        output: args.output,
        sort_by: args.sort_by,
        ..Default::default()
    };

    let config = match ConfigFile::discover(args.config.as_deref(), &cwd)
        .and_then(|file| BenchConfig::resolve(file, flags))
    {
        Ok(config) => config,
        Err(e) => return Ok(super::report_failure(&e)),
    };

    let mut orchestrator = Orchestrator::new(config);
    match orchestrator.compare_files(&args.baseline, &args.target).await {
        Ok(results) => {
            let summary = summarize(&results);
            tracing::info!(endpoints = results.len(), "{}", summary.sentence());
            if let Some(path) = &orchestrator.config().output {
                eprintln!("Comparison written to {}", path.display());
            }
            Ok(SUCCESS)
        }
        Err(e) => Ok(super::report_failure(&e)),
    }
}

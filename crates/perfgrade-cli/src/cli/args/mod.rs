use clap::{Parser, Subcommand};
use perfgrade_core::model::Metric;
use std::path::PathBuf;

pub mod bench;
pub use bench::*;


#[derive(Parser)]
#[command(
    name = "perfgrade",
    version,
    about = "Benchmark an OpenAPI-described HTTP service, grade every endpoint, and compare runs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load-test every operation in an API document and grade the results
    Bench(BenchArgs),
    /// Compare two saved reports (json, csv or html)
    Compare(CompareArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CompareArgs {
    /// Baseline report file
    pub baseline: PathBuf,

    /// Target report file
    pub target: PathBuf,

    /// Write the comparison to a file; the extension picks the format
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub sort_by: Option<Metric>,

    /// Thresholds used when a report carries no grades
    #[arg(long, env = "PERFGRADE_CONFIG")]
    pub config: Option<PathBuf>,
}

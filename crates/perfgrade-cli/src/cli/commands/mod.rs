use super::args::*;

pub(crate) mod bench;
pub(crate) mod compare;

use crate::exit_codes::{self, SUCCESS};
use perfgrade_core::BenchError;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Bench(args) => bench::run(args).await,
        Command::Compare(args) => compare::run(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}

/// Print a failed run to stderr and pick its exit code.
pub(crate) fn report_failure(err: &BenchError) -> i32 {
    let code = exit_codes::for_error(err);
    eprintln!("error: {err}");
    tracing::debug!(kind = err.kind().as_str(), code, "exiting");
    code
}

pub mod compare;
pub mod config;
pub mod errors;
pub mod executor;
pub mod gate;
pub mod grade;
pub mod hooks;
pub mod model;
pub mod orchestrator;
pub mod plugins;
pub mod report;
pub mod scenario;
pub mod spec;

// Convenience re-exports
pub use config::{BenchConfig, ConfigFile, FlagOverrides};
pub use errors::{BenchError, BenchErrorKind};
pub use executor::{HttpLoadExecutor, LoadExecutor, LoadOptions};
pub use hooks::{HookEvent, HookName, HookRegistry, Plugin};
pub use model::{
    ComparisonResult, EndpointMetrics, Grade, Grades, Latency, Measurement, Metric, Report,
    Scenario,
};
pub use orchestrator::{Orchestrator, RunOutcome, RunState};
pub use spec::{ApiDocument, DocumentResolver, SpecResolver};

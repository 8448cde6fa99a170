//! Load execution seam.

pub mod http;

use async_trait::async_trait;
use std::time::Duration;

use crate::model::{Measurement, Scenario};

pub use http::HttpLoadExecutor;

pub const DEFAULT_CONNECTIONS: usize = 10;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Concurrent connections held open against the endpoint.
    pub connections: usize,
    pub duration: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            connections: DEFAULT_CONNECTIONS,
            duration: DEFAULT_DURATION,
        }
    }
}

/// Runs one load test against one scenario.
///
/// Implementations own transport, connection pooling and percentile computation.
#[async_trait]
pub trait LoadExecutor: Send + Sync {
    async fn execute(&self, scenario: &Scenario, options: &LoadOptions) -> anyhow::Result<Measurement>;
}

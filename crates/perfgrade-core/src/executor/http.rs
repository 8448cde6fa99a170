use anyhow::Context;
use async_trait::async_trait;
use reqwest::Method;
use std::time::Instant;

use super::{LoadExecutor, LoadOptions};
use crate::model::{Latency, Measurement, Scenario};

#[derive(Debug, Default)]
struct WorkerStats {
    /// Microseconds, one entry per completed request.
    latencies: Vec<u64>,
    requests: u64,
    errors: u64,
    non_2xx: u64,
}

/// Closed-loop HTTP load generator: each connection issues requests back to back
/// until the duration elapses.
#[derive(Debug, Clone, Default)]
pub struct HttpLoadExecutor {
    client: reqwest::Client,
}

impl HttpLoadExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

async fn worker(
    client: reqwest::Client,
    method: Method,
    scenario: Scenario,
    deadline: tokio::time::Instant,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while tokio::time::Instant::now() < deadline {
        let mut req = client.request(method.clone(), &scenario.url);
        if let Some(headers) = &scenario.headers {
            for (k, v) in headers {
                req = req.header(k, v);
            }
        }
        if let Some(body) = &scenario.body {
            req = req.body(body.clone());
        }

        let started = Instant::now();
        let sent = tokio::time::timeout_at(deadline, async {
            let resp = req.send().await?;
            let status = resp.status();
            resp.bytes().await?;
            Ok::<_, reqwest::Error>(status)
        })
        .await;

        match sent {
            // Deadline reached mid-request; the request is not counted.
            Err(_) => break,
            Ok(Ok(status)) => {
                let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
                stats.latencies.push(micros);
                stats.requests += 1;
                if !status.is_success() {
                    stats.non_2xx += 1;
                }
            }
            Ok(Err(e)) => {
                stats.errors += 1;
                if stats.errors == 1 {
                    tracing::debug!(url = %scenario.url, error = %e, "request failed");
                }
            }
        }
    }
    stats
}

/// Nearest-rank percentile over sorted microsecond samples, in milliseconds.
fn percentile_ms(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1] as f64 / 1000.0
}

#[async_trait]
impl LoadExecutor for HttpLoadExecutor {
    async fn execute(&self, scenario: &Scenario, options: &LoadOptions) -> anyhow::Result<Measurement> {
        anyhow::ensure!(options.connections > 0, "connections must be at least 1");
        let method = Method::from_bytes(scenario.method.as_bytes())
            .with_context(|| format!("invalid HTTP method '{}'", scenario.method))?;

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + options.duration;
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..options.connections {
            tasks.spawn(worker(
                self.client.clone(),
                method.clone(),
                scenario.clone(),
                deadline,
            ));
        }

        let mut latencies = Vec::new();
        let (mut requests, mut errors, mut non_2xx) = (0u64, 0u64, 0u64);
        while let Some(joined) = tasks.join_next().await {
            let stats = joined.context("load worker panicked")?;
            latencies.extend(stats.latencies);
            requests += stats.requests;
            errors += stats.errors;
            non_2xx += stats.non_2xx;
        }

        latencies.sort_unstable();
        let elapsed = started.elapsed().as_secs_f64();
        let rps = if elapsed > 0.0 {
            requests as f64 / elapsed
        } else {
            0.0
        };
        if non_2xx > 0 {
            tracing::warn!(endpoint = %scenario.key(), non_2xx, "non-2xx responses");
        }

        Ok(Measurement {
            latency: Latency {
                p50: percentile_ms(&latencies, 50.0),
                p90: percentile_ms(&latencies, 90.0),
                p99: percentile_ms(&latencies, 99.0),
            },
            rps,
            errors,
            requests,
            non_2xx,
        })
    }
}

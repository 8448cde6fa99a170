//! Scenario progress: a guard owned by the orchestrator that always reports
//! completion, whichever way the run ends.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    Advanced { done: usize, total: usize, endpoint: String },
    Finished { done: usize, total: usize },
}

/// Receives progress events. Implementations may throttle.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Active progress indicator. Emits `Finished` when dropped.
pub struct Progress {
    sink: Option<ProgressSink>,
    done: usize,
    total: usize,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("done", &self.done)
            .field("total", &self.total)
            .finish()
    }
}

impl Progress {
    pub fn start(total: usize, sink: Option<ProgressSink>) -> Self {
        if let Some(s) = &sink {
            s(ProgressEvent::Started { total });
        }
        Self {
            sink,
            done: 0,
            total,
        }
    }

    pub fn advance(&mut self, endpoint: &str) {
        self.done += 1;
        if let Some(s) = &self.sink {
            s(ProgressEvent::Advanced {
                done: self.done,
                total: self.total,
                endpoint: endpoint.to_string(),
            });
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Some(s) = self.sink.take() {
            s(ProgressEvent::Finished {
                done: self.done,
                total: self.total,
            });
        }
    }
}

#[must_use]
pub fn format_progress_line(done: usize, total: usize, endpoint: &str) -> String {
    format!("Benchmarking {done}/{total} {endpoint}")
}

const PROGRESS_MIN_INTERVAL_MS: u64 = 200;

pub(crate) fn progress_step(total: usize) -> usize {
    if total <= 10 {
        1
    } else {
        std::cmp::max(1, total / 10)
    }
}

/// Throttled stderr sink. Always prints the final scenario and an
/// interrupted-run notice when `Finished` arrives early.
pub fn default_progress_sink() -> ProgressSink {
    let last_emit: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
    Arc::new(move |ev: ProgressEvent| match ev {
        ProgressEvent::Started { total } => {
            if total > 0 {
                eprintln!("Running {total} scenario(s)...");
            }
        }
        ProgressEvent::Advanced {
            done,
            total,
            endpoint,
        } => {
            let now = Instant::now();
            let mut last = last_emit.lock().unwrap_or_else(|p| p.into_inner());
            let interval_ok = last
                .map(|t| now.saturating_duration_since(t) >= Duration::from_millis(PROGRESS_MIN_INTERVAL_MS))
                .unwrap_or(true);
            let step = progress_step(total);
            if done == total || (interval_ok && (done == 1 || done % step == 0)) {
                *last = Some(now);
                eprintln!("{}", format_progress_line(done, total, &endpoint));
            }
        }
        ProgressEvent::Finished { done, total } => {
            if done < total {
                eprintln!("Stopped after {done}/{total} scenario(s)");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&events);
        let sink: ProgressSink = Arc::new(move |ev| e.lock().unwrap().push(ev));
        (sink, events)
    }

    #[test]
    fn emits_started_advanced_finished() {
        let (sink, events) = recording();
        {
            let mut p = Progress::start(2, Some(sink));
            p.advance("GET /a");
            p.advance("GET /b");
        }
        let events = events.lock().unwrap();
        assert_eq!(events[0], ProgressEvent::Started { total: 2 });
        assert_eq!(
            events[2],
            ProgressEvent::Advanced {
                done: 2,
                total: 2,
                endpoint: "GET /b".into()
            }
        );
        assert_eq!(events[3], ProgressEvent::Finished { done: 2, total: 2 });
    }

    #[test]
    fn finishes_on_early_exit() {
        fn fails(sink: ProgressSink) -> Result<(), &'static str> {
            let mut p = Progress::start(3, Some(sink));
            p.advance("GET /a");
            Err("boom")
        }
        let (sink, events) = recording();
        assert!(fails(sink).is_err());
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&ProgressEvent::Finished { done: 1, total: 3 })
        );
    }

    #[test]
    fn progress_line_format() {
        assert_eq!(format_progress_line(1, 4, "GET /pets"), "Benchmarking 1/4 GET /pets");
        assert_eq!(progress_step(5), 1);
        assert_eq!(progress_step(100), 10);
    }
}

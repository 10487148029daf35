use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use crate::app::{App, FetchOptions, ProgressEvent, ProgressSink};
use crate::domain::SourceKey;
use crate::helioviewer::HelioviewerClient;

const DEFAULT_POLL: Duration = Duration::from_millis(250);

/// Shared flag flipped by the Ctrl+C handler and observed between fetches.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.stop())
    }
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub sources: Vec<SourceKey>,
    pub interval: Duration,
    pub max_iterations: Option<u64>,
    pub fetch: FetchOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Interrupted,
    IterationLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub iterations: u64,
    pub downloaded: usize,
    pub failed: usize,
    pub output_dir: String,
    pub stopped_by: StopReason,
}

pub struct Monitor<'a, C: HelioviewerClient> {
    app: &'a App<C>,
    stop: StopSignal,
    poll: Duration,
}

impl<'a, C: HelioviewerClient> Monitor<'a, C> {
    pub fn new(app: &'a App<C>, stop: StopSignal) -> Self {
        Self {
            app,
            stop,
            poll: DEFAULT_POLL,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Runs full passes over `options.sources` until stopped or the iteration limit is hit.
    pub fn run(&self, options: &MonitorOptions, sink: &dyn ProgressSink) -> MonitorSummary {
        let mut iterations = 0u64;
        let mut downloaded = 0usize;
        let mut failed = 0usize;

        tracing::info!(
            sources = ?options.sources.iter().map(SourceKey::as_str).collect::<Vec<_>>(),
            interval_secs = options.interval.as_secs(),
            "monitoring started"
        );

        let limit_reached = |done: u64| options.max_iterations.is_some_and(|limit| done >= limit);

        let stopped_by = loop {
            if self.stop.is_stopped() {
                break StopReason::Interrupted;
            }
            if limit_reached(iterations) {
                break StopReason::IterationLimit;
            }

            iterations += 1;
            let started = Utc::now().to_rfc3339();
            tracing::info!(iteration = iterations, "iteration started");
            sink.event(ProgressEvent {
                message: format!("iteration #{iterations} at {started}"),
                elapsed: None,
            });

            let batch = self.app.fetch_batch(&options.sources, options.fetch, sink);
            downloaded += batch.items.len();
            failed += batch.failures.len();
            sink.event(ProgressEvent {
                message: format!(
                    "iteration #{iterations} done: {}/{} downloaded",
                    batch.items.len(),
                    batch.attempted()
                ),
                elapsed: None,
            });

            if limit_reached(iterations) {
                break StopReason::IterationLimit;
            }

            sink.event(ProgressEvent {
                message: format!(
                    "waiting {} seconds until next download",
                    options.interval.as_secs()
                ),
                elapsed: None,
            });
            if self.sleep(options.interval) {
                break StopReason::Interrupted;
            }
        };

        tracing::info!(iterations, downloaded, failed, "monitoring stopped");
        MonitorSummary {
            iterations,
            downloaded,
            failed,
            output_dir: self.app.output().root().to_string(),
            stopped_by,
        }
    }

    /// Returns `true` when the stop signal ended the wait early.
    ///
    /// An interval past the range of `Instant` waits until stopped.
    fn sleep(&self, total: Duration) -> bool {
        let deadline = Instant::now().checked_add(total);
        loop {
            if self.stop.is_stopped() {
                return true;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.poll.min(deadline - now)
                }
                None => self.poll,
            };
            thread::sleep(slice);
        }
    }
}

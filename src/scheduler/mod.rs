//! Scheduler - runs one labeling task per chunk with a time budget

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};

use crate::cluster::{cluster_chunk, ChunkOutput, ChunkRange, ChunkWindow};
use crate::error::ClusterError;

/// Default per-chunk time budget.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

/// Unit of work executed for each chunk. Runs on a blocking thread.
pub trait ChunkWorker: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, window: &ChunkWindow) -> Result<ChunkOutput, ClusterError>;
}

/// Union-find labeling, the worker used for real builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnionFindWorker;

impl ChunkWorker for UnionFindWorker {
    fn name(&self) -> &str {
        "union_find"
    }

    fn run(&self, window: &ChunkWindow) -> Result<ChunkOutput, ClusterError> {
        cluster_chunk(window)
    }
}

/// Timing for a single chunk task
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub range: ChunkRange,
    pub duration_ms: f64,
    pub groups: usize,
    pub points: usize,
}

/// Outputs in chunk order, with per-chunk reports.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub outputs: Vec<ChunkOutput>,
    pub reports: Vec<ChunkReport>,
}

/// Dispatches chunk windows to concurrent tasks and collects their outputs.
///
/// The first failed or timed-out chunk fails the whole run; remaining tasks
/// are aborted. A worker already running on a blocking thread cannot be
/// interrupted and is left to finish with its result discarded.
pub struct TaskScheduler {
    worker: Arc<dyn ChunkWorker>,
    timeout: Duration,
}

impl TaskScheduler {
    pub fn new(worker: Arc<dyn ChunkWorker>, timeout: Duration) -> Self {
        Self { worker, timeout }
    }

    pub fn worker_name(&self) -> &str {
        self.worker.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(&self, windows: Vec<ChunkWindow>) -> Result<ScheduledRun, ClusterError> {
        let count = windows.len();
        let mut tasks = JoinSet::new();

        for window in windows {
            let range = window.range;
            let worker = Arc::clone(&self.worker);
            let budget = self.timeout;
            tasks.spawn(async move {
                let started = Instant::now();
                let job = tokio::task::spawn_blocking(move || worker.run(&window));
                let result = match tokio::time::timeout(budget, job).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => Err(processing_error(range, join_err)),
                    Err(_) => Err(ClusterError::ChunkTimeout {
                        chunk: range.index,
                        start_x: range.start_x,
                        end_x: range.end_x,
                        timeout: budget,
                    }),
                };
                (range, started.elapsed(), result)
            });
        }

        let mut outputs: Vec<Option<ChunkOutput>> = (0..count).map(|_| None).collect();
        let mut reports = Vec::with_capacity(count);

        while let Some(joined) = tasks.join_next().await {
            let (range, elapsed, result) = match joined {
                Ok(settled) => settled,
                Err(join_err) => {
                    // The wrapper task maps every worker outcome itself, so this
                    // only happens if the runtime is shutting down.
                    tasks.abort_all();
                    return Err(ClusterError::ChunkProcessing {
                        chunk: usize::MAX,
                        start_x: 0,
                        end_x: 0,
                        message: format!("scheduler task failed: {join_err}"),
                    });
                }
            };

            match result {
                Ok(output) => {
                    let report = ChunkReport {
                        range,
                        duration_ms: elapsed.as_secs_f64() * 1_000.0,
                        groups: output.groups.len(),
                        points: output.point_count(),
                    };
                    debug!(
                        chunk = range.index,
                        start_x = range.start_x,
                        end_x = range.end_x,
                        groups = report.groups,
                        duration_ms = report.duration_ms,
                        "chunk clustered"
                    );
                    reports.push(report);
                    if let Some(slot) = outputs.get_mut(range.index) {
                        *slot = Some(output);
                    }
                }
                Err(err) => {
                    error!(
                        chunk = range.index,
                        start_x = range.start_x,
                        end_x = range.end_x,
                        worker = self.worker.name(),
                        error = %err,
                        "chunk failed, aborting build"
                    );
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        reports.sort_by_key(|report| report.range.index);
        let outputs = outputs
            .into_iter()
            .enumerate()
            .map(|(index, output)| {
                output.ok_or_else(|| ClusterError::ChunkProcessing {
                    chunk: index,
                    start_x: 0,
                    end_x: 0,
                    message: "chunk produced no result".to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScheduledRun { outputs, reports })
    }
}

fn processing_error(range: ChunkRange, err: JoinError) -> ClusterError {
    let message = if err.is_panic() {
        format!("worker panicked: {}", panic_message(err.into_panic()))
    } else {
        "worker task was cancelled".to_string()
    };
    ClusterError::ChunkProcessing {
        chunk: range.index,
        start_x: range.start_x,
        end_x: range.end_x,
        message,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

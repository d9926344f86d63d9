//! Bounded fan-out of conversion jobs onto a worker pool.
//!
//! The caller's thread acts as coordinator: it admits at most `max_workers`
//! jobs to a rayon pool, waits for completions on a channel, records each
//! outcome, and admits the next pending job. Workers only convert; all
//! bookkeeping, logging and event delivery happen on the coordinator.
//!
//! Drop-mode conversions go through a second pool of the same size, built on
//! first use.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use tracing::{debug, info, warn};

use crate::error::ConversionError;
use crate::format::{dropped_output, SourceKind};
use crate::job::{
    BatchEvent, BatchRun, CancelToken, ConversionJob, ConversionOutcome, JobState, OutcomeStatus,
};
use crate::log_store::LogStore;
use crate::registry::ConverterRegistry;

/// Message a worker sends back when its job is done
struct Completion {
    slot: usize,
    result: Result<(), ConversionError>,
    elapsed: Duration,
}

type PoolBuilder = fn(usize, &'static str) -> Result<ThreadPool, ThreadPoolBuildError>;

fn build_pool(threads: usize, prefix: &'static str) -> Result<ThreadPool, ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{}-{}", prefix, i))
        .build()
}

/// Per-destination guard for drop mode; the flag records whether an earlier
/// dropped file already wrote that destination.
type DestinationLock = Arc<Mutex<bool>>;

pub struct ConversionDispatcher {
    registry: Arc<ConverterRegistry>,
    max_workers: usize,
    pool_builder: PoolBuilder,
    drop_pool: OnceLock<Result<Arc<ThreadPool>, String>>,
    drop_destinations: Mutex<HashMap<PathBuf, DestinationLock>>,
}

impl ConversionDispatcher {
    /// `max_workers` is clamped to at least one.
    pub fn new(registry: Arc<ConverterRegistry>, max_workers: usize) -> Self {
        Self {
            registry,
            max_workers: max_workers.max(1),
            pool_builder: build_pool,
            drop_pool: OnceLock::new(),
            drop_destinations: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_pool_builder(mut self, pool_builder: PoolBuilder) -> Self {
        self.pool_builder = pool_builder;
        self
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Run `jobs` to completion and return the finished batch.
    ///
    /// Every job yields exactly one outcome. Converter errors and panics fail
    /// only their own job. Once `cancel` is set no further jobs are admitted;
    /// jobs already running finish normally and the rest fail as cancelled.
    /// An empty job list returns an empty run without logging or events.
    pub fn run<F>(
        &self,
        jobs: Vec<ConversionJob>,
        log: &LogStore,
        cancel: &CancelToken,
        mut on_event: F,
    ) -> BatchRun
    where
        F: FnMut(&BatchEvent),
    {
        let total = jobs.len();
        let mut run = BatchRun::new(total);
        if total == 0 {
            return run;
        }

        let workers = self.max_workers.min(total);
        on_event(&BatchEvent::Started { total, workers });
        emit_log(log, &mut on_event, start_message(&jobs));
        info!(total, workers, "starting batch");

        // slot = position in the submitted list
        let mut jobs: Vec<Option<ConversionJob>> = jobs.into_iter().map(Some).collect();
        let mut pending: VecDeque<usize> = (0..total).collect();

        match (self.pool_builder)(workers, "fileconv-worker") {
            Ok(pool) => {
                let (tx, rx) = mpsc::channel::<Completion>();
                // dropped once nothing more will be admitted, so a worker
                // vanishing without reporting ends `recv` instead of hanging it
                let mut tx = Some(tx);
                let mut in_flight = 0usize;

                loop {
                    while let Some(sender) = tx.as_ref() {
                        if in_flight >= workers || cancel.is_cancelled() {
                            break;
                        }
                        let Some(slot) = pending.pop_front() else {
                            break;
                        };
                        let Some(job) = jobs[slot].as_ref() else {
                            continue;
                        };
                        run.transition(slot, JobState::Running);
                        on_event(&BatchEvent::JobStarted {
                            slot,
                            source: job.source_path.clone(),
                        });
                        debug!(slot, source = %job.source_path.display(), "admitting job");
                        self.spawn_job(&pool, slot, job, sender.clone());
                        in_flight += 1;
                    }
                    if pending.is_empty() || cancel.is_cancelled() {
                        tx = None;
                    }

                    if in_flight == 0 {
                        break;
                    }

                    match rx.recv() {
                        Ok(done) => {
                            in_flight -= 1;
                            if let Some(job) = jobs[done.slot].take() {
                                self.finish(&mut run, log, &mut on_event, done.slot, job, done.result, done.elapsed);
                            }
                        }
                        Err(_) => {
                            // every sender is gone; fail whatever is still marked running
                            warn!(in_flight, "worker channel closed unexpectedly");
                            for slot in 0..total {
                                if run.state(slot) == Some(JobState::Running) {
                                    if let Some(job) = jobs[slot].take() {
                                        let err = ConversionError::Panicked {
                                            reason: "worker exited without reporting".into(),
                                        };
                                        self.finish(&mut run, log, &mut on_event, slot, job, Err(err), Duration::ZERO);
                                    }
                                }
                            }
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "could not build worker pool");
                emit_log(log, &mut on_event, format!("Failed to create worker threads: {}", reason));
                while let Some(slot) = pending.pop_front() {
                    if let Some(job) = jobs[slot].take() {
                        let err = ConversionError::ThreadCreationFailed {
                            reason: reason.clone(),
                        };
                        self.finish(&mut run, log, &mut on_event, slot, job, Err(err), Duration::ZERO);
                    }
                }
            }
        }

        // anything still pending was never admitted because of cancellation
        if !pending.is_empty() {
            run.cancelled = true;
            while let Some(slot) = pending.pop_front() {
                if let Some(job) = jobs[slot].take() {
                    self.finish(&mut run, log, &mut on_event, slot, job, Err(ConversionError::Cancelled), Duration::ZERO);
                }
            }
        }

        let (succeeded, failed) = (run.succeeded(), run.failed());
        let summary = if run.cancelled {
            format!("Batch conversion cancelled. {}.", run.summary())
        } else {
            format!("Batch conversion completed. {}.", run.summary())
        };
        emit_log(log, &mut on_event, summary);
        info!(succeeded, failed, cancelled = run.cancelled, "batch finished");
        on_event(&BatchEvent::Finished {
            succeeded,
            failed,
            cancelled: run.cancelled,
        });
        run
    }

    fn spawn_job(
        &self,
        pool: &ThreadPool,
        slot: usize,
        job: &ConversionJob,
        tx: mpsc::Sender<Completion>,
    ) {
        let registry = Arc::clone(&self.registry);
        let job = job.clone();
        pool.spawn(move || {
            let started = Instant::now();
            let result = convert_guarded(&registry, &job);
            let _ = tx.send(Completion {
                slot,
                result,
                elapsed: started.elapsed(),
            });
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn finish<F>(
        &self,
        run: &mut BatchRun,
        log: &LogStore,
        on_event: &mut F,
        slot: usize,
        job: ConversionJob,
        result: Result<(), ConversionError>,
        elapsed: Duration,
    ) where
        F: FnMut(&BatchEvent),
    {
        let outcome = outcome_for(job, result, elapsed);
        if outcome.is_success() {
            debug!(slot, elapsed_ms = elapsed.as_millis() as u64, "{}", outcome.message);
        } else {
            warn!(slot, "{}", outcome.message);
        }
        emit_log(log, on_event, outcome.message.clone());
        let progress = run.record(slot, outcome.clone());
        on_event(&BatchEvent::JobFinished { outcome, progress });
    }

    /// Queue a single dropped file for conversion.
    ///
    /// `.txt` files become `converted_output.pdf` and `.png` files become
    /// `converted_output.jpg` inside `output_dir`. Dropped files share one
    /// pool of `max_workers` threads. Drops aimed at the same destination
    /// run one at a time, and every one after the first notes in its outcome
    /// that it replaced an earlier output. Unsupported inputs and a pool
    /// that cannot be started are returned immediately.
    pub fn submit_dropped(
        &self,
        path: &Path,
        output_dir: &Path,
        log: Arc<LogStore>,
    ) -> Result<DroppedTask, ConversionError> {
        log.append(format!("Starting conversion of {}...", path.display()));
        let kind = SourceKind::from_path(path);
        let Some((target, file_name)) = kind.and_then(dropped_output) else {
            let err = ConversionError::NotSupported {
                source_kind: kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                target: "a drop-mode format".to_string(),
            };
            log.append(format!("Unsupported format: {}", path.display()));
            return Err(err);
        };
        if let Some(kind) = kind {
            log.append(format!("{} file detected.", describe_kind(kind)));
        }

        let job = ConversionJob::new(path, output_dir.join(file_name), target);
        let pool = match self.drop_pool() {
            Ok(pool) => pool,
            Err(reason) => {
                let err = ConversionError::ThreadCreationFailed { reason };
                log.append(format!("Failed to convert {}: {}", job.display_name(), err));
                return Err(err);
            }
        };

        let guard = self.destination_lock(&job.destination_path);
        let registry = Arc::clone(&self.registry);
        let thread_job = job.clone();
        let (tx, rx) = mpsc::channel();
        pool.spawn(move || {
            let mut written = guard.lock().unwrap_or_else(|e| e.into_inner());
            let started = Instant::now();
            let result = convert_guarded(&registry, &thread_job);
            let replaced = result.is_ok() && *written;
            let mut outcome = outcome_for(thread_job, result, started.elapsed());
            if outcome.is_success() {
                *written = true;
            }
            if replaced {
                outcome.message.push_str(" (replaced an earlier dropped file's output)");
            }
            log.append(outcome.message.clone());
            let _ = tx.send(outcome);
        });

        Ok(DroppedTask { job, outcome: rx })
    }

    fn drop_pool(&self) -> Result<Arc<ThreadPool>, String> {
        self.drop_pool
            .get_or_init(|| {
                (self.pool_builder)(self.max_workers, "fileconv-drop")
                    .map(Arc::new)
                    .map_err(|e| {
                        warn!(error = %e, "could not build drop-mode pool");
                        e.to_string()
                    })
            })
            .clone()
    }

    fn destination_lock(&self, destination: &Path) -> DestinationLock {
        let mut locks = self
            .drop_destinations
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(destination.to_path_buf()).or_default())
    }
}

/// Handle to a queued drop-mode conversion.
pub struct DroppedTask {
    job: ConversionJob,
    outcome: mpsc::Receiver<ConversionOutcome>,
}

impl DroppedTask {
    pub fn destination(&self) -> &Path {
        &self.job.destination_path
    }

    /// Block until the conversion ends.
    pub fn wait(self) -> ConversionOutcome {
        match self.outcome.recv() {
            Ok(outcome) => outcome,
            Err(_) => outcome_for(
                self.job,
                Err(ConversionError::Panicked {
                    reason: "worker exited without reporting".into(),
                }),
                Duration::ZERO,
            ),
        }
    }
}

/// Look up and run the converter for `job`, turning a panic into an error.
fn convert_guarded(registry: &ConverterRegistry, job: &ConversionJob) -> Result<(), ConversionError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let kind = job
            .source_kind
            .ok_or_else(|| ConversionError::not_supported(None, job.target_format))?;
        let converter = registry.lookup(kind, job.target_format)?;
        converter.convert(&job.source_path, &job.destination_path)
    }))
    .unwrap_or_else(|payload| {
        Err(ConversionError::Panicked {
            reason: panic_message(payload.as_ref()),
        })
    })
}

fn outcome_for(
    job: ConversionJob,
    result: Result<(), ConversionError>,
    elapsed: Duration,
) -> ConversionOutcome {
    match result {
        Ok(()) => ConversionOutcome {
            message: format!(
                "Converted {} -> {}",
                job.display_name(),
                job.destination_path.display()
            ),
            job,
            status: OutcomeStatus::Success,
            elapsed,
        },
        Err(e) => ConversionOutcome {
            message: format!("Failed to convert {}: {}", job.display_name(), e),
            job,
            status: OutcomeStatus::Failure,
            elapsed,
        },
    }
}

fn emit_log<F>(log: &LogStore, on_event: &mut F, message: String)
where
    F: FnMut(&BatchEvent),
{
    let entry = log.append(message);
    on_event(&BatchEvent::Log(entry));
}

fn start_message(jobs: &[ConversionJob]) -> String {
    let first = jobs[0].target_format;
    if jobs.iter().all(|j| j.target_format == first) {
        format!("Starting batch conversion of {} files to {}...", jobs.len(), first)
    } else {
        format!("Starting batch conversion of {} files...", jobs.len())
    }
}

fn describe_kind(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Text => "Text",
        SourceKind::Png => "PNG",
        SourceKind::Jpeg => "JPEG",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

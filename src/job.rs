//! Jobs, outcomes and the per-batch bookkeeping the dispatcher keeps.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::format::{SourceKind, TargetFormat};
use crate::log_store::LogEntry;

/// One file's conversion request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub target_format: TargetFormat,
    /// Detected from the source extension; `None` when unrecognized
    pub source_kind: Option<SourceKind>,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, target: TargetFormat) -> Self {
        let source_path = source.into();
        let source_kind = SourceKind::from_path(&source_path);
        Self {
            source_path,
            destination_path: destination.into(),
            target_format: target,
            source_kind,
        }
    }

    /// Batch-mode job writing `<output_dir>/<file name>.<target>`.
    pub fn for_batch(source: &Path, output_dir: &Path, target: TargetFormat) -> Self {
        let destination = target.batch_output_path(source, output_dir).unwrap_or_else(|| {
            output_dir.join(format!("converted_output.{}", target.extension()))
        });
        Self::new(source, destination, target)
    }

    /// File name of the source, for log lines
    pub fn display_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }
}

/// Lifecycle of a job inside a batch. `Succeeded` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Terminal result of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub job: ConversionJob,
    pub status: OutcomeStatus,
    pub message: String,
    /// Time spent converting; zero for jobs that never ran
    pub elapsed: Duration,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Progress after a job completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// `completed / total`, in [0, 1]
    pub fraction: f64,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let fraction = if total > 0 {
            (completed.min(total) as f64 / total as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            completed,
            total,
            fraction,
        }
    }

    /// Whole-number percentage, e.g. `"67%"`
    pub fn percentage_text(&self) -> String {
        format!("{:.0}%", self.fraction * 100.0)
    }
}

/// Everything a batch reports to its observer, in the order it happens
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize, workers: usize },
    /// A pending job was admitted to a worker
    JobStarted { slot: usize, source: PathBuf },
    Log(LogEntry),
    JobFinished { outcome: ConversionOutcome, progress: Progress },
    /// Always the last event of a non-empty batch
    Finished { succeeded: usize, failed: usize, cancelled: bool },
}

/// State of one batch, owned by the dispatcher while it runs and handed back
/// to the caller afterwards.
#[derive(Debug, Clone, Default)]
pub struct BatchRun {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    /// In completion order
    pub outcomes: Vec<ConversionOutcome>,
    pub cancelled: bool,
    /// Most jobs ever running at once
    pub peak_running: usize,
    running: usize,
    states: Vec<JobState>,
}

impl BatchRun {
    pub fn new(total_jobs: usize) -> Self {
        Self {
            total_jobs,
            states: vec![JobState::Pending; total_jobs],
            ..Default::default()
        }
    }

    /// No jobs: the input had nothing to convert
    pub fn is_empty(&self) -> bool {
        self.total_jobs == 0
    }

    pub fn is_complete(&self) -> bool {
        self.completed_jobs == self.total_jobs
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.completed_jobs, self.total_jobs)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// `"N succeeded, M failed"`
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded(), self.failed())
    }

    pub fn state(&self, slot: usize) -> Option<JobState> {
        self.states.get(slot).copied()
    }

    pub(crate) fn transition(&mut self, slot: usize, next: JobState) {
        let current = self.states[slot];
        debug_assert!(
            current.can_transition_to(next),
            "illegal job transition {:?} -> {:?}",
            current,
            next
        );
        self.states[slot] = next;
        if current == JobState::Running {
            self.running -= 1;
        }
        if next == JobState::Running {
            self.running += 1;
            self.peak_running = self.peak_running.max(self.running);
        }
    }

    pub(crate) fn record(&mut self, slot: usize, outcome: ConversionOutcome) -> Progress {
        let next = if outcome.is_success() {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        self.transition(slot, next);
        self.completed_jobs += 1;
        debug_assert!(self.completed_jobs <= self.total_jobs);
        self.outcomes.push(outcome);
        self.progress()
    }
}

/// Shared flag that stops a batch from admitting more work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

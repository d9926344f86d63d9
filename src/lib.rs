//! # fileconv - Batch File Conversion Library
//!
//! `fileconv` converts every recognized file in a directory to a chosen
//! target format, running the conversions on a bounded worker pool.
//!
//! ## Features
//!
//! - Directory scanning for `.txt`, `.jpg` and `.png` inputs
//! - TXT → TXT copy, TXT → CSV, TXT → PDF and PNG → JPEG converters
//! - At most `max_workers` conversions in flight at once
//! - One outcome per file; a failing or crashing converter never stops the batch
//! - Progress and log events for integration with UI applications
//! - Append-only persisted conversion log
//!
//! ## Example
//!
//! ```no_run
//! use fileconv::{BatchConverter, CancelToken, TargetFormat};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = BatchConverter::new();
//! let run = converter.run_batch(
//!     Path::new("input"),
//!     Path::new("output"),
//!     TargetFormat::Csv,
//!     &CancelToken::new(),
//!     |_event| {},
//! )?;
//! println!("{}", run.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress Reporting
//!
//! ```no_run
//! use fileconv::{BatchConverter, BatchEvent, CancelToken, TargetFormat};
//! use std::path::Path;
//!
//! let converter = BatchConverter::new();
//! converter.run_batch(
//!     Path::new("input"),
//!     Path::new("output"),
//!     TargetFormat::Pdf,
//!     &CancelToken::new(),
//!     |event| match event {
//!         BatchEvent::Log(entry) => println!("{}", entry.message),
//!         BatchEvent::JobFinished { progress, .. } => {
//!             println!("Progress: {}", progress.percentage_text());
//!         }
//!         _ => {}
//!     },
//! ).unwrap();
//! ```

pub mod codecs;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod job;
pub mod log_store;
pub mod persist;
pub mod registry;
pub mod scanner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

pub use codecs::{PngToJpeg, TextCopy, TextToCsv, TextToPdf};
pub use config::{AppConfig, PdfLayout};
pub use dispatcher::{ConversionDispatcher, DroppedTask};
pub use error::{BatchError, ConfigError, ConversionError, ScanError};
pub use format::{SourceKind, TargetFormat};
pub use job::{
    BatchEvent, BatchRun, CancelToken, ConversionJob, ConversionOutcome, JobState, OutcomeStatus,
    Progress,
};
pub use log_store::{LogEntry, LogStore};
pub use registry::{Converter, ConverterRegistry};

/// Main entry point: scans, dispatches and logs batch conversions
pub struct BatchConverter {
    config: AppConfig,
    dispatcher: ConversionDispatcher,
    log: Arc<LogStore>,
}

impl BatchConverter {
    /// Create a converter with default configuration
    pub fn new() -> Self {
        Self::build(AppConfig::default(), None)
    }

    /// Create a converter with custom configuration
    pub fn with_config(config: AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    /// Create a converter using a custom registry, e.g. with extra converters
    pub fn with_registry(config: AppConfig, registry: ConverterRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, Some(registry)))
    }

    /// Load configuration from a file
    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        Self::with_config(AppConfig::load(path)?)
    }

    fn build(config: AppConfig, registry: Option<ConverterRegistry>) -> Self {
        let registry = registry.unwrap_or_else(|| ConverterRegistry::with_defaults(&config));
        let dispatcher = ConversionDispatcher::new(Arc::new(registry), config.max_workers);
        let log = Arc::new(LogStore::persistent(config.log_file.clone()));
        Self {
            config,
            dispatcher,
            log,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn registry(&self) -> &ConverterRegistry {
        self.dispatcher.registry()
    }

    /// Convert every recognized file in `input_dir` to `target`, writing
    /// `<name>.<target>` files into `output_dir`.
    ///
    /// Setup problems (missing input directory, unusable output directory)
    /// are returned before any job starts. Per-file failures are reported in
    /// the returned [`BatchRun`]. A directory with nothing to convert yields an
    /// empty run and writes no log entries.
    pub fn run_batch<F>(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        target: TargetFormat,
        cancel: &CancelToken,
        on_event: F,
    ) -> Result<BatchRun, BatchError>
    where
        F: FnMut(&BatchEvent),
    {
        let files = match scanner::scan_recognized(input_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "batch setup failed");
                self.log.append(format!(
                    "Error opening input directory {} for batch conversion.",
                    input_dir.display()
                ));
                return Err(e.into());
            }
        };

        if files.is_empty() {
            info!(input = %input_dir.display(), "no files found to convert");
            return Ok(BatchRun::new(0));
        }

        if let Err(source) = persist::ensure_output_dir(output_dir) {
            warn!(error = %source, "batch setup failed");
            self.log.append(format!(
                "Error preparing output directory {} for batch conversion.",
                output_dir.display()
            ));
            return Err(BatchError::OutputDirectory {
                path: output_dir.to_path_buf(),
                source,
            });
        }

        let jobs = files
            .iter()
            .map(|f| ConversionJob::for_batch(f, output_dir, target))
            .collect();
        Ok(self.dispatcher.run(jobs, &self.log, cancel, on_event))
    }

    /// Drop-mode conversion of individual files into fixed-name outputs in
    /// `output_dir`; see [`ConversionDispatcher::submit_dropped`].
    ///
    /// Returns one entry per path, in order.
    pub fn convert_dropped(
        &self,
        paths: &[PathBuf],
        output_dir: &Path,
    ) -> Vec<Result<DroppedTask, ConversionError>> {
        paths
            .iter()
            .map(|p| {
                self.dispatcher
                    .submit_dropped(p, output_dir, Arc::clone(&self.log))
            })
            .collect()
    }

    /// The full persisted log, or `None` if nothing has been logged yet
    pub fn view_logs(&self) -> std::io::Result<Option<String>> {
        self.log.read_persisted()
    }
}

impl Default for BatchConverter {
    fn default() -> Self {
        Self::new()
    }
}

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One human-readable line of the conversion log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }

    /// The line written to the persisted log, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.timestamp.format(TIMESTAMP_FORMAT), self.message)
    }
}

/// Append-only log kept in memory and, optionally, mirrored to a text file.
///
/// Appends are serialized through one lock, so entries written from
/// different threads never interleave within a line.
#[derive(Debug)]
pub struct LogStore {
    path: Option<PathBuf>,
    entries: Mutex<Vec<LogEntry>>,
}

impl LogStore {
    /// A log that also appends every entry to `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record `message` and return the stored entry.
    ///
    /// Failing to write the file is reported through `tracing` and does not
    /// lose the in-memory entry.
    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(message);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, &entry.to_line()) {
                tracing::warn!(path = %path.display(), error = %e, "failed to write conversion log");
            }
        }
        entries.push(entry.clone());
        entry
    }

    /// Entries appended through this store, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|e| e.message.contains(needle))
    }

    /// The whole persisted log as one blob; `None` when there is no log file yet.
    pub fn read_persisted(&self) -> io::Result<Option<String>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // single write so the line lands whole
    file.write_all(format!("{}\n", line).as_bytes())
}

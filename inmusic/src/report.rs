use chrono::Local;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::error;

/// Receives every caught fault of an ingestion run, tagged `"<source>:<stage>"`.
///
/// Sinks must never fail or block the caller.
pub trait ErrorSink: Send + Sync {
    fn report(&self, context: &str, error: &dyn Display);
}

/// Appends `[dd/mm/YYYY HH:MM:SS] context: error` lines to a log file.
///
/// Write failures are swallowed; the entry is still emitted through `tracing`.
#[derive(Debug)]
pub struct LogFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

pub const DEFAULT_TAIL_CHARS: usize = 4000;

impl LogFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last `max_chars` characters of the log, or a placeholder when nothing was logged yet.
    pub fn tail(&self, max_chars: usize) -> String {
        tail_log(&self.path, max_chars)
    }
}

/// Reads the tail of a log file written by [`LogFileSink`].
pub fn tail_log(path: &Path, max_chars: usize) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let total = text.chars().count();
            if total > max_chars {
                text.chars().skip(total - max_chars).collect()
            } else {
                text
            }
        }
        Err(_) => "No logs yet.".to_string(),
    }
}

impl ErrorSink for LogFileSink {
    fn report(&self, context: &str, err: &dyn Display) {
        error!(context, "{}", err);

        let ts = Local::now().format("%d/%m/%Y %H:%M:%S");
        let line = format!("[{}] {}: {}\n", ts, context, err);
        // A poisoned lock only means another writer panicked mid-line.
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
    }
}

/// Keeps every report in memory. Used for run summaries and in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(context, message)` pairs in report order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contexts(&self) -> Vec<String> {
        self.entries().into_iter().map(|(c, _)| c).collect()
    }
}

impl ErrorSink for MemorySink {
    fn report(&self, context: &str, error: &dyn Display) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.push((context.to_string(), error.to_string()));
    }
}

/// Fans a report out to several sinks, e.g. the log file plus a counter for the run summary.
pub struct TeeSink {
    sinks: Vec<std::sync::Arc<dyn ErrorSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn ErrorSink>>) -> Self {
        Self { sinks }
    }
}

impl ErrorSink for TeeSink {
    fn report(&self, context: &str, error: &dyn Display) {
        for sink in &self.sinks {
            sink.report(context, error);
        }
    }
}

//! File-backed trace, call and screenshot logs. Write failures are logged
//! and never reach the run.

use chrono::Utc;
use deskpilot_core::{TraceKind, TraceSink};
use deskpilot_providers::{CallLogSink, CallRecord};
use deskpilot_tools::{CapturedScreenshot, ScreenshotLogSink};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Appends one JSON object per line.
pub struct JsonlWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn append<T: Serialize>(&self, value: &T) {
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize log entry for {}: {}", self.path.display(), e);
                return;
            }
        };

        let mut guard = self.file.lock();
        if guard.is_none() {
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(e) => {
                    warn!("Failed to open {}: {}", self.path.display(), e);
                    return;
                }
            }
        }
        if let Some(file) = guard.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("Failed to write {}: {}", self.path.display(), e);
            }
        }
    }
}

#[derive(Serialize)]
struct TraceEntry<'a> {
    at: chrono::DateTime<Utc>,
    kind: TraceKind,
    message: &'a str,
}

pub struct FileTraceSink {
    writer: JsonlWriter,
}

impl FileTraceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: JsonlWriter::new(path),
        }
    }
}

impl TraceSink for FileTraceSink {
    fn trace(&self, kind: TraceKind, message: &str) {
        self.writer.append(&TraceEntry {
            at: Utc::now(),
            kind,
            message,
        });
    }
}

pub struct FileCallLog {
    writer: JsonlWriter,
}

impl FileCallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: JsonlWriter::new(path),
        }
    }
}

impl CallLogSink for FileCallLog {
    fn record(&self, record: &CallRecord) {
        self.writer.append(record);
    }
}

/// Saves each transmitted screenshot next to a JSONL index of its metadata.
pub struct ScreenshotDirectory {
    dir: PathBuf,
    index: JsonlWriter,
    counter: AtomicU64,
}

#[derive(Serialize)]
struct ScreenshotEntry<'a> {
    file: String,
    #[serde(flatten)]
    screenshot: &'a CapturedScreenshot,
}

impl ScreenshotDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            index: JsonlWriter::new(dir.join("index.jsonl")),
            dir,
            counter: AtomicU64::new(0),
        }
    }
}

impl ScreenshotLogSink for ScreenshotDirectory {
    fn record(&self, screenshot: &CapturedScreenshot) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("Failed to create {}: {}", self.dir.display(), e);
            return;
        }
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let extension = if screenshot.media_type.ends_with("png") {
            "png"
        } else {
            "jpg"
        };
        let file = format!("{:04}.{}", seq, extension);
        if let Err(e) = std::fs::write(self.dir.join(&file), &screenshot.bytes) {
            warn!("Failed to save screenshot {}: {}", file, e);
            return;
        }
        self.index.append(&ScreenshotEntry { file, screenshot });
    }
}

/// Trace, call and screenshot sinks rooted in one run directory.
pub struct RunLogs {
    pub trace: Arc<FileTraceSink>,
    pub calls: Arc<FileCallLog>,
    pub screenshots: Arc<ScreenshotDirectory>,
    pub dir: PathBuf,
}

impl RunLogs {
    /// Creates `<log_dir>/<timestamp>/`.
    pub fn create(log_dir: &Path) -> std::io::Result<Self> {
        let dir = log_dir.join(Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            trace: Arc::new(FileTraceSink::new(dir.join("trace.jsonl"))),
            calls: Arc::new(FileCallLog::new(dir.join("calls.jsonl"))),
            screenshots: Arc::new(ScreenshotDirectory::new(dir.join("screenshots"))),
            dir,
        })
    }
}

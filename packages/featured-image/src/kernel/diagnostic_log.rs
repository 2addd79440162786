//! Operator-facing diagnostic log.
//!
//! An append-only text file with one `[YYYY-MM-DD HH:MM:SS] [LEVEL] message`
//! line per event. ERROR lines are always written; everything else only
//! while the `debug` setting is on. Fed by a `tracing` layer so the rest of
//! the crate just uses the normal macros. The layer hands lines to a
//! `tracing_appender` worker thread, so events never touch the file from
//! async tasks.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::config::SettingsStore;

pub const NO_LOG_FILE: &str = "(no log file yet - publish a post to generate entries)";
pub const EMPTY_LOG_FILE: &str = "(log file is empty)";

/// Event targets recorded in the file; everything else (http stack, runtime) is ignored.
const RECORDED_TARGETS: [&str; 2] = ["featured_image", "gemini_client"];

pub struct DiagnosticLog {
    path: PathBuf,
    settings: Arc<SettingsStore>,
    // Serializes appends and truncation.
    write_lock: Mutex<()>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>, settings: Arc<SettingsStore>) -> Self {
        Self {
            path: path.into(),
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a line at `level` goes into the file right now.
    pub fn records(&self, level: Level) -> bool {
        level == Level::ERROR || self.settings.debug_enabled()
    }

    /// Append a line if the level passes the debug gate. Blocks on file I/O.
    pub fn write(&self, level: Level, message: &str) -> io::Result<()> {
        if !self.records(level) {
            return Ok(());
        }
        self.append(format_line(level, message, Utc::now()).as_bytes())
    }

    fn append(&self, line: &[u8]) -> io::Result<()> {
        let _guard = self.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line)
    }

    /// Last `lines` lines of the file (all of them when `lines` is 0).
    pub fn recent_lines(&self, lines: usize) -> io::Result<String> {
        let content = {
            let _guard = self.lock();
            match fs::read_to_string(&self.path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(NO_LOG_FILE.to_string())
                }
                Err(e) => return Err(e),
            }
        };

        if content.is_empty() {
            return Ok(EMPTY_LOG_FILE.to_string());
        }

        let all: Vec<&str> = content.trim().split('\n').collect();
        let start = if lines == 0 {
            0
        } else {
            all.len().saturating_sub(lines)
        };
        Ok(all[start..].join("\n"))
    }

    /// Truncate the file if it exists.
    pub fn clear(&self) -> io::Result<()> {
        let _guard = self.lock();
        if self.path.exists() {
            fs::write(&self.path, "")?;
        }
        Ok(())
    }

    /// Layer feeding this log, plus the guard that flushes pending lines
    /// when dropped. Keep the guard alive for as long as the layer is used.
    pub fn layer(self: &Arc<Self>) -> (DiagnosticLayer, WorkerGuard) {
        let (writer, guard) = tracing_appender::non_blocking(FileAppender { log: self.clone() });
        let layer = DiagnosticLayer {
            log: self.clone(),
            writer,
        };
        (layer, guard)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn format_line(level: Level, message: &str, at: DateTime<Utc>) -> String {
    format!("[{}] [{}] {}\n", at.format("%Y-%m-%d %H:%M:%S"), level, message)
}

/// Blocking sink run on the appender's worker thread. Each write is one line.
struct FileAppender {
    log: Arc<DiagnosticLog>,
}

impl Write for FileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `tracing` layer that forwards this workspace's events to a [`DiagnosticLog`].
#[derive(Clone)]
pub struct DiagnosticLayer {
    log: Arc<DiagnosticLog>,
    writer: NonBlocking,
}

impl<S> Layer<S> for DiagnosticLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !RECORDED_TARGETS
            .iter()
            .any(|target| metadata.target().starts_with(target))
        {
            return;
        }
        // Stamped and gated when the event happens, written later.
        if !self.log.records(*metadata.level()) {
            return;
        }

        let mut collector = LineCollector::default();
        event.record(&mut collector);
        let line = format_line(*metadata.level(), &collector.finish(), Utc::now());
        // Nowhere left to report a failing log write.
        let _ = self.writer.clone().write_all(line.as_bytes());
    }
}

/// Renders the message followed by `key=value` pairs for the other fields.
#[derive(Default)]
struct LineCollector {
    message: String,
    fields: Vec<String>,
}

impl LineCollector {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for LineCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

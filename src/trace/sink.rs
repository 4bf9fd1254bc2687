//! Process-wide destination of the `TRICOT` channel
//!
//! A [`TraceSink`] holds at most one open log file. Opening a new one always
//! releases the previous file first, so a sink never writes to two files.

use crate::error::SinkError;
use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, Level};

static GLOBAL_SINK: Lazy<Arc<TraceSink>> = Lazy::new(|| Arc::new(TraceSink::new()));

/// Directory that holds default log files; it is never created by the sink
pub const DEFAULT_LOG_DIR: &str = "logs";

struct Destination {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Destination {
    fn close(mut self) {
        if let Err(e) = self.writer.flush() {
            debug!("Failed to flush trace log {:?} on close: {}", self.path, e);
        }
    }
}

#[derive(Default)]
struct SinkState {
    destination: Option<Destination>,
    min_level: Option<Level>,
}

/// Single-slot holder of the trace log file
#[derive(Default)]
pub struct TraceSink {
    state: Mutex<SinkState>,
}

impl TraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the current destination with `path`, or with a timestamped
    /// file under `logs/` when no path is given
    ///
    /// The previous file is closed before the new one is opened, so a failed
    /// open leaves the sink without any destination.
    pub fn open_log(&self, path: Option<&Path>) -> Result<PathBuf, SinkError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_log_path(&Local::now()));

        let mut state = self.lock();
        let previous = state.destination.take();
        let previous_path = previous.as_ref().map(|d| d.path.clone());
        if let Some(previous) = previous {
            previous.close();
        }
        state.min_level = Some(Level::INFO);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        state.destination = Some(Destination {
            path: path.clone(),
            writer: BufWriter::new(file),
        });
        drop(state);

        if let Some(previous) = previous_path {
            debug!("Closed trace log {}", previous.display());
        }
        info!("Opened trace log {}", path.display());
        Ok(path)
    }

    /// Detaches and closes the current destination, returning its path
    pub fn close_log(&self) -> Option<PathBuf> {
        let destination = self.lock().destination.take()?;
        let path = destination.path.clone();
        destination.close();
        Some(path)
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.lock().destination.as_ref().map(|d| d.path.clone())
    }

    /// Whether an event at `level` passes the channel's minimum severity
    pub fn accepts(&self, level: &Level) -> bool {
        self.lock().min_level.map_or(false, |min| *level <= min)
    }

    /// Appends one line to the current destination
    ///
    /// Returns `Ok(false)` when no destination is attached.
    pub fn write_line(&self, line: &str) -> io::Result<bool> {
        let mut state = self.lock();
        let Some(destination) = state.destination.as_mut() else {
            return Ok(false);
        };
        writeln!(destination.writer, "{}", line)?;
        destination.writer.flush()?;
        Ok(true)
    }
}

impl std::fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceSink")
            .field("path", &self.current_path())
            .finish()
    }
}

/// `logs/<YYYY-MM-DD_HH-MM-SS>.log` for the given instant
pub fn default_log_path<Tz>(now: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    Path::new(DEFAULT_LOG_DIR).join(format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// The sink behind the process-wide `TRICOT` channel
pub fn global_sink() -> Arc<TraceSink> {
    Arc::clone(&GLOBAL_SINK)
}

/// Sets the process-wide trace log file, replacing any previous one
pub fn open_log(path: Option<&Path>) -> Result<PathBuf, SinkError> {
    GLOBAL_SINK.open_log(path)
}

/// Closes the process-wide trace log file
pub fn close_log() -> Option<PathBuf> {
    GLOBAL_SINK.close_log()
}

pub fn current_log_path() -> Option<PathBuf> {
    GLOBAL_SINK.current_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_default_log_path_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            default_log_path(&now),
            PathBuf::from("logs/2024-03-07_09-05-01.log")
        );
    }

    #[test]
    fn test_default_paths_differ_across_seconds() {
        let first = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_ne!(default_log_path(&first), default_log_path(&second));
    }

    #[test]
    fn test_new_sink_has_no_destination() {
        let sink = TraceSink::new();
        assert!(sink.current_path().is_none());
        assert!(!sink.accepts(&Level::ERROR));
        assert!(!sink.write_line("dropped").unwrap());
    }

    #[test]
    fn test_open_log_sets_info_threshold() {
        let dir = TempDir::new().unwrap();
        let sink = TraceSink::new();
        sink.open_log(Some(&dir.path().join("a.log"))).unwrap();

        assert!(sink.accepts(&Level::INFO));
        assert!(sink.accepts(&Level::WARN));
        assert!(!sink.accepts(&Level::DEBUG));
    }

    #[test]
    fn test_reopen_switches_destination() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let sink = TraceSink::new();

        sink.open_log(Some(&first)).unwrap();
        sink.write_line("one").unwrap();
        sink.open_log(Some(&second)).unwrap();
        sink.write_line("two").unwrap();

        assert_eq!(sink.current_path(), Some(second.clone()));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "two\n");
    }

    #[test]
    fn test_open_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let sink = TraceSink::new();
        sink.open_log(Some(&path)).unwrap();
        sink.write_line("later").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn test_failed_open_leaves_no_destination() {
        let dir = TempDir::new().unwrap();
        let sink = TraceSink::new();
        sink.open_log(Some(&dir.path().join("ok.log"))).unwrap();

        let missing = dir.path().join("missing").join("x.log");
        let err = sink.open_log(Some(&missing)).unwrap_err();

        assert!(matches!(err, SinkError::Open { ref path, .. } if *path == missing));
        assert!(sink.current_path().is_none());
        assert!(!sink.write_line("lost").unwrap());
    }

    #[test]
    fn test_close_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.log");
        let sink = TraceSink::new();
        sink.open_log(Some(&path)).unwrap();

        assert_eq!(sink.close_log(), Some(path));
        assert!(sink.close_log().is_none());
    }
}

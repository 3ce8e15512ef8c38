//! Append-only move and scan event log.
//!
//! Lines look like `2022-04-09 17:02:11.384 STEP position=1450`. The format is for
//! people reading the file, nothing parses it back.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{PersistenceError, Result};
use crate::motor::ScanJob;

/// Something worth a line in the scan log.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Scan accepted and starting.
    Started(ScanJob),
    /// Scan point reached.
    Reached {
        /// Absolute position of the point.
        position: i32,
    },
    /// Every scan point visited.
    Completed,
    /// Scan ended early.
    Aborted {
        /// Why.
        reason: &'static str,
        /// Stage position when it stopped.
        position: i32,
    },
    /// A stand-alone move finished.
    Moved {
        /// Position before the move.
        from: i32,
        /// Requested target.
        target: i32,
        /// Position after the move.
        to: i32,
    },
}

impl core::fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ScanEvent::Started(job) => write!(
                f,
                "START start={} stop={} step={} dwell_ms={} pulse_ms={}",
                job.start,
                job.stop,
                job.step,
                job.dwell.as_millis(),
                job.pulse_width.as_millis()
            ),
            ScanEvent::Reached { position } => write!(f, "STEP position={}", position),
            ScanEvent::Completed => write!(f, "DONE"),
            ScanEvent::Aborted { reason, position } => {
                write!(f, "ABORT reason=\"{}\" position={}", reason, position)
            }
            ScanEvent::Moved { from, target, to } => {
                write!(f, "MOVE from={} target={} to={}", from, target, to)
            }
        }
    }
}

/// Write-only sink for scan events.
pub trait ScanLog: Send + Sync {
    /// Record one event. Failures are the sink's problem, never the caller's.
    fn record(&self, event: &ScanEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScanLog;

impl ScanLog for NullScanLog {
    fn record(&self, _event: &ScanEvent) {}
}

/// Text file sink with local timestamps.
#[derive(Debug)]
pub struct FileScanLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileScanLog {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(PersistenceError::from)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(PersistenceError::from)?;
        tracing::info!("Scan log opened at {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Where the log lives.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScanLog for FileScanLog {
    fn record(&self, event: &ScanEvent) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{} {}", stamp, event).and_then(|_| file.flush()) {
            tracing::error!("Could not write scan log {}: {}", self.path.display(), e);
        }
    }
}

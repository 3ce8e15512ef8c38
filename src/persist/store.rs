//! Crash-consistent position file.
//!
//! The sentinel field is flipped to [`BAD_MAGIC`] before the first step of a run and
//! restored at clean shutdown, so a file still carrying the bad sentinel at start-up
//! means the previous run died while the stage may have been moving.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::StepsPerCount;
use crate::error::{PersistenceError, Result};

use super::readout::CounterReadout;
use super::record::{
    PersistedRecord, BAD_MAGIC, CURRENT_POS_OFFSET, GOOD_MAGIC, HOME_POS_OFFSET, MAGIC_OFFSET,
    RECORD_LEN,
};

/// Attempts per field write.
pub const WRITE_ATTEMPTS: u32 = 10;

/// Where operator counter readings come from.
pub trait ReadoutSource {
    /// Show `prompt` and return the next line typed, or `None` when input ended.
    fn next_line(&mut self, prompt: &str) -> Option<String>;

    /// Tell the operator why the last line was refused.
    fn reject(&mut self, line: &str, reason: &str) {
        tracing::warn!("Readout '{}' refused: {}", line, reason);
    }
}

/// Reads the counter value from standard input.
#[derive(Debug, Default)]
pub struct StdinReadout;

impl ReadoutSource for StdinReadout {
    fn next_line(&mut self, prompt: &str) -> Option<String> {
        let mut out = io::stdout();
        let _ = write!(out, "{}", prompt);
        let _ = out.flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn reject(&mut self, line: &str, reason: &str) {
        println!("Entered: {}, {}.", line.trim(), reason);
    }
}

/// Position file of the scanning stage.
#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
    steps_per_count: StepsPerCount,
}

impl PositionStore {
    /// Store backed by `path`. Nothing is touched until [`PositionStore::load`].
    pub fn new<P: AsRef<Path>>(path: P, steps_per_count: StepsPerCount) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            steps_per_count,
        }
    }

    /// Path of the position file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counter conversion factor.
    pub fn steps_per_count(&self) -> StepsPerCount {
        self.steps_per_count
    }

    /// Load the stored position.
    ///
    /// Without a file, the operator is asked for the counter reading and a fresh
    /// record (home 0) is written. An existing file is never modified here.
    ///
    /// # Errors
    ///
    /// Fails on a wrong-sized record, a sentinel other than [`GOOD_MAGIC`], a zero
    /// position, input ending before a valid readout, or writes exhausting their
    /// retries.
    pub fn load(&self, readout: &mut dyn ReadoutSource) -> Result<PersistedRecord> {
        if !self.path.exists() {
            return self.create(readout);
        }

        let record = self.read_record()?;
        if record.valid_magic != GOOD_MAGIC {
            tracing::error!(
                "Position file {}: magic 0x{:08x} is invalid",
                self.path.display(),
                record.valid_magic
            );
            return Err(PersistenceError::BadSentinel(record.valid_magic).into());
        }
        if record.current_pos == 0 {
            tracing::error!("Position file {}: position is 0", self.path.display());
            return Err(PersistenceError::ZeroPosition.into());
        }
        tracing::info!(
            "Loaded position {} (home {}) from {}",
            record.current_pos,
            record.home_pos,
            self.path.display()
        );
        Ok(record)
    }

    /// Read and decode the file without judging its contents.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable or not exactly one record long.
    pub fn read_record(&self) -> Result<PersistedRecord> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::Missing.into())
            }
            Err(e) => return Err(PersistenceError::from(e).into()),
        };
        PersistedRecord::decode(&bytes).map_err(|e| {
            tracing::error!("Position file {}: {}", self.path.display(), e);
            e.into()
        })
    }

    /// Mark the stored position untrustworthy. Only the sentinel is written.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or the write exhausts its retries.
    pub fn invalidate(&self) -> Result<()> {
        let mut file = match OpenOptions::new().write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::Missing.into())
            }
            Err(e) => return Err(PersistenceError::from(e).into()),
        };
        write_field(&mut file, MAGIC_OFFSET, BAD_MAGIC, "valid magic")?;
        file.sync_all().map_err(PersistenceError::from)?;
        tracing::info!("Position file {} invalidated", self.path.display());
        Ok(())
    }

    /// Store the final position and home with the good sentinel.
    ///
    /// The sentinel is written last, so an interrupted store still reads as invalid.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or a write exhausts its retries.
    pub fn validate_and_store(&self, current_pos: i32, home_pos: i32) -> Result<()> {
        self.write_record(&PersistedRecord::valid(current_pos, home_pos))?;
        tracing::info!(
            "Stored position {} (home {}) to {}",
            current_pos,
            home_pos,
            self.path.display()
        );
        Ok(())
    }

    fn create(&self, readout: &mut dyn ReadoutSource) -> Result<PersistedRecord> {
        tracing::warn!("Position file {} not found", self.path.display());
        let prompt = "Current position not known, please enter current counter readout (must be in X.XX format): ";
        let position = loop {
            let line = readout.next_line(prompt).ok_or(PersistenceError::NoReadout)?;
            match line.parse::<CounterReadout>() {
                Ok(value) => match value.to_steps(self.steps_per_count) {
                    Some(0) => readout.reject(&line, "value too small"),
                    Some(steps) => break steps,
                    None => readout.reject(&line, "value too large"),
                },
                Err(e) => readout.reject(&line, &e.to_string()),
            }
        };

        let record = PersistedRecord::valid(position, 0);
        self.write_record(&record)?;
        tracing::info!(
            "Created position file {} at position {}",
            self.path.display(),
            position
        );
        Ok(record)
    }

    fn write_record(&self, record: &PersistedRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(PersistenceError::from)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(PersistenceError::from)?;
        write_field(&mut file, CURRENT_POS_OFFSET, record.current_pos, "current position")?;
        write_field(&mut file, HOME_POS_OFFSET, record.home_pos, "home position")?;
        write_field(&mut file, MAGIC_OFFSET, record.valid_magic, "valid magic")?;
        file.set_len(RECORD_LEN as u64)
            .and_then(|_| file.sync_all())
            .map_err(PersistenceError::from)?;
        Ok(())
    }
}

/// Write one field, seeking back to its offset before every attempt.
fn write_field(file: &mut File, offset: u64, value: i32, field: &'static str) -> Result<()> {
    let bytes = value.to_le_bytes();
    for attempt in 1..=WRITE_ATTEMPTS {
        let result = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(&bytes));
        match result {
            Ok(()) => return Ok(()),
            Err(e) => tracing::warn!("Writing {} failed (attempt {}): {}", field, attempt, e),
        }
    }
    tracing::error!("Could not store {}", field);
    Err(PersistenceError::WriteFailed {
        field,
        attempts: WRITE_ATTEMPTS,
    }
    .into())
}

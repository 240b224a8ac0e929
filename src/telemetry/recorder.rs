//! # Sample Recorder
//!
//! Appends received samples to `samples_<timestamp>_<seq>.jsonl` files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RecordingConfig;
use crate::error::Result;
use crate::samples::PhysicalSample;

const FILE_PREFIX: &str = "samples_";
const FILE_EXTENSION: &str = "jsonl";

/// One line of a recording file
#[derive(Debug, Serialize)]
pub struct SampleRecord<'a> {
    /// RFC 3339 receive time
    pub recorded_at: String,

    pub samples: &'a [PhysicalSample],
}

/// Open recording file
struct RecordingFile {
    path: PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

/// Rotating JSONL writer for received samples
pub struct SampleRecorder {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    current: Option<RecordingFile>,
    /// Distinguishes files opened within the same second
    sequence: u32,
}

impl std::fmt::Debug for SampleRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRecorder")
            .field("dir", &self.dir)
            .field("max_records_per_file", &self.max_records_per_file)
            .field("max_files_to_keep", &self.max_files_to_keep)
            .finish_non_exhaustive()
    }
}

impl SampleRecorder {
    /// Create a recorder writing into `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Recording samples");

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            current: None,
            sequence: 0,
        })
    }

    /// Create a recorder from the `[recording]` section
    pub fn from_config(config: &RecordingConfig) -> Result<Self> {
        Self::new(&config.dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// Write one record holding `samples`, received now
    pub fn record(&mut self, samples: &[PhysicalSample]) -> Result<()> {
        self.record_at(Utc::now(), samples)
    }

    /// Write one record holding `samples`, received at `at`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or written
    pub fn record_at(&mut self, at: DateTime<Utc>, samples: &[PhysicalSample]) -> Result<()> {
        let record = SampleRecord {
            recorded_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            samples,
        };
        let line = serde_json::to_string(&record)?;
        let max_records = self.max_records_per_file;

        let file = self.current_file()?;
        writeln!(file.writer, "{}", line)?;
        file.writer.flush()?;
        file.records += 1;

        if file.records >= max_records {
            debug!(path = %file.path.display(), records = file.records, "Recording file full");
            self.current = None;
        }
        Ok(())
    }

    /// Path of the file currently being written, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|file| file.path.as_path())
    }

    fn current_file(&mut self) -> Result<&mut RecordingFile> {
        let file = match self.current.take() {
            Some(file) => file,
            None => {
                let file = self.open_file()?;
                self.prune();
                file
            }
        };
        Ok(self.current.insert(file))
    }

    fn open_file(&mut self) -> Result<RecordingFile> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = loop {
            self.sequence += 1;
            let candidate = self.dir.join(format!(
                "{}{}_{:04}.{}",
                FILE_PREFIX, stamp, self.sequence, FILE_EXTENSION
            ));
            if !candidate.exists() {
                break candidate;
            }
        };

        debug!(path = %path.display(), "Opening recording file");
        let file = File::create(&path)?;
        Ok(RecordingFile {
            path,
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Delete the oldest recording files beyond `max_files_to_keep`
    ///
    /// Failures are logged; the file just opened stays in use either way.
    fn prune(&self) {
        let mut files = match recording_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list recording files");
                return;
            }
        };
        if files.len() <= self.max_files_to_keep {
            return;
        }

        // Names sort chronologically
        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed old recording file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove recording file"),
            }
        }
    }
}

fn recording_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_recording = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXTENSION))
            .unwrap_or(false);
        if is_recording {
            files.push(path);
        }
    }
    Ok(files)
}

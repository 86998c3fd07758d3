//! JSONL telemetry writer with size-based rotation.
//!
//! Files are named `<prefix>_<YYYYmmdd_HHMMSS>_<seq>.jsonl` so that a plain
//! lexical sort matches creation order. Files already in the directory that
//! match the prefix count towards the retention limit.

use chrono::{Local, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::power::PowerDecision;

/// One telemetry line
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    /// Wall clock, RFC 3339 with milliseconds
    pub ts: String,
    /// Link time since start
    pub elapsed_ms: u32,
    pub distance_m: f32,
    pub power_mw: u16,
    pub rssi_dbm: i8,
    pub lq: u8,
    pub snr: i8,
    pub lq_avg: u8,
    pub decision: PowerDecision,
}

impl TelemetryRecord {
    /// Stamp a record with the current time
    #[allow(clippy::too_many_arguments)]
    pub fn now(
        elapsed_ms: u32,
        distance_m: f32,
        power_mw: u16,
        rssi_dbm: i8,
        lq: u8,
        snr: i8,
        lq_avg: u8,
        decision: PowerDecision,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            elapsed_ms,
            distance_m,
            power_mw,
            rssi_dbm,
            lq,
            snr,
            lq_avg,
            decision,
        }
    }
}

/// Rotating JSONL log
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    prefix: String,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    sequence: u32,
    files: VecDeque<PathBuf>,
}

impl TelemetryLogger {
    /// Open a logger in `dir`, creating the directory if needed
    ///
    /// No file is created until the first record is written.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or listed
    pub fn new<P: AsRef<Path>>(
        dir: P,
        prefix: &str,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut existing: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_log_file(path, prefix))
            .collect();
        existing.sort();

        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            sequence: 0,
            files: existing.into(),
        })
    }

    /// Append one record, rotating first if the current file is full
    pub fn log(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Path of the file currently being written
    pub fn current_file(&self) -> Option<&Path> {
        self.writer.as_ref().and(self.files.back().map(PathBuf::as_path))
    }

    /// Log files currently retained, oldest first
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}_{}_{:04}.jsonl",
            self.prefix,
            Local::now().format("%Y%m%d_%H%M%S"),
            self.sequence
        );
        self.sequence = self.sequence.wrapping_add(1);

        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Telemetry log: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.files.push_back(path);

        while self.files.len() > self.max_files_to_keep {
            if let Some(old) = self.files.pop_front() {
                if let Err(e) = fs::remove_file(&old) {
                    warn!("Failed to remove old telemetry log {}: {}", old.display(), e);
                }
            }
        }
        Ok(())
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush telemetry log: {}", e);
        }
    }
}

fn is_log_file(path: &Path, prefix: &str) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&format!("{}_", prefix)))
}

//! Rotating JSONL writer

use super::types::TelemetryRecord;
use crate::config::TelemetryConfig;
use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "telemetry_";
const FILE_SUFFIX: &str = ".jsonl";

/// JSONL telemetry writer with size-based rotation
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    sequence: u32,
}

impl TelemetryLogger {
    /// Create the log directory and an idle logger
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;
        info!("Telemetry logging to {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    /// Append one record, rotating first if the current file is full
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or written
    pub fn log(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Telemetry files in the log directory, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be listed
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.sequence += 1;
        let name = format!(
            "{}{}_{:04}{}",
            FILE_PREFIX,
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            self.sequence,
            FILE_SUFFIX
        );
        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened telemetry file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let files = self.files()?;
        let excess = files.len().saturating_sub(self.max_files_to_keep);
        for path in &files[..excess] {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old telemetry file {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::LinkHealth;
    use crate::session::CraftSession;
    use tempfile::TempDir;

    fn config(dir: &TempDir, per_file: usize, keep: usize) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().into_owned(),
            max_records_per_file: per_file,
            max_files_to_keep: keep,
            interval_ms: 1000,
        }
    }

    fn record(uptime_ms: u64) -> TelemetryRecord {
        TelemetryRecord::capture(
            uptime_ms,
            &CraftSession::new(),
            &LinkHealth::new(125, 75),
            None,
            None,
        )
    }

    #[test]
    fn test_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let mut logger = TelemetryLogger::new(&config(&dir, 10, 3)).unwrap();

        logger.log(&record(1)).unwrap();
        logger.log(&record(2)).unwrap();

        let files = logger.files().unwrap();
        assert_eq!(files.len(), 1);
        let contents = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["uptime_ms"], 2);
    }

    #[test]
    fn test_rotates_and_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let mut logger = TelemetryLogger::new(&config(&dir, 2, 2)).unwrap();

        for uptime in 0..7 {
            logger.log(&record(uptime)).unwrap();
        }

        // 7 records at 2 per file is 4 files, of which 2 survive
        let files = logger.files().unwrap();
        assert_eq!(files.len(), 2);
        let last = fs::read_to_string(files.last().unwrap()).unwrap();
        assert_eq!(last.lines().count(), 1);
        assert!(last.contains("\"uptime_ms\":6"));
    }

    #[test]
    fn test_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let mut logger = TelemetryLogger::new(&config(&dir, 1, 1)).unwrap();

        logger.log(&record(0)).unwrap();
        logger.log(&record(1)).unwrap();

        assert_eq!(logger.files().unwrap().len(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }
}

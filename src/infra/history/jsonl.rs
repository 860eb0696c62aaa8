//! File-backed history sink using JSON lines.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::{HistoryEntry, HistorySink, SchedulerError};

/// Appends one JSON document per transition to a file and keeps an index in
/// memory for queries. Existing entries are loaded on open.
///
/// Appends are buffered and written out on [`HistorySink::flush`].
pub struct JsonlHistorySink {
    path: PathBuf,
    file: BufWriter<File>,
    entries: Vec<HistoryEntry>,
}

impl JsonlHistorySink {
    /// Open (or create) the history file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| SchedulerError::History(e.to_string()))?;
        }
        let entries = Self::load(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| SchedulerError::History(e.to_string()))?;
        Self::terminate_torn_line(&mut file).map_err(|e| SchedulerError::History(e.to_string()))?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            entries,
        })
    }

    /// History file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A crash can leave the last line without its newline. Close it so the
    /// next append starts on a line of its own.
    fn terminate_torn_line(file: &mut File) -> std::io::Result<()> {
        if file.metadata()?.len() == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
            file.sync_data()?;
        }
        Ok(())
    }

    fn load(path: &Path) -> Result<Vec<HistoryEntry>, SchedulerError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|e| SchedulerError::History(e.to_string()))?;
        let mut entries = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| SchedulerError::History(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                // A torn last line from a crash is dropped.
                Err(e) => tracing::warn!("skipping history line {} in {}: {}", n + 1, path.display(), e),
            }
        }
        Ok(entries)
    }
}

impl HistorySink for JsonlHistorySink {
    fn append(&mut self, entry: &HistoryEntry) -> Result<(), SchedulerError> {
        let line = serde_json::to_string(entry).map_err(|e| SchedulerError::History(e.to_string()))?;
        writeln!(self.file, "{line}").map_err(|e| SchedulerError::History(e.to_string()))?;
        self.entries.push(entry.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SchedulerError> {
        self.file.flush().map_err(|e| SchedulerError::History(e.to_string()))
    }

    fn entries(&self, task_id: &str) -> Result<Vec<HistoryEntry>, SchedulerError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }

    fn last_seq(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.seq).max()
    }
}

//! Output partitions.
//!
//! Each extraction step writes two partitions, `raw/<kind>` and
//! `transformed/<kind>`, one JSON document per line. A partition only becomes
//! visible when committed, and a committed partition replaces whatever the
//! previous run left there.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{ExtractError, Result};

/// Destination for output partitions.
pub trait OutputSink: Send + Sync {
    /// Start a fresh write of `partition`.
    fn open(&self, partition: &str) -> Result<Box<dyn PartitionWriter>>;
}

/// An open partition. Dropping it without [`commit`](PartitionWriter::commit)
/// discards everything written.
pub trait PartitionWriter: Send {
    /// Append one line. Returns the bytes written, newline included.
    fn write_line(&mut self, line: &str) -> Result<u64>;

    /// Publish the partition, replacing any previous content.
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Writes partitions as `.jsonl` files under a root directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `partition`.
    pub fn partition_path(&self, partition: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", partition))
    }
}

impl OutputSink for FileSink {
    fn open(&self, partition: &str) -> Result<Box<dyn PartitionWriter>> {
        if partition.is_empty() || partition.split('/').any(|s| s.is_empty() || s == "..") {
            return Err(ExtractError::Config(format!(
                "invalid output partition name: '{}'",
                partition
            )));
        }

        let path = self.partition_path(partition);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Atomic write: write to temp file, then rename on commit
        let temp_path = path.with_extension("jsonl.tmp");
        let file = File::create(&temp_path)?;
        Ok(Box::new(FilePartition {
            out: Some(BufWriter::new(file)),
            temp_path,
            path,
        }))
    }
}

struct FilePartition {
    out: Option<BufWriter<File>>,
    temp_path: PathBuf,
    path: PathBuf,
}

impl PartitionWriter for FilePartition {
    fn write_line(&mut self, line: &str) -> Result<u64> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| ExtractError::Config("partition already committed".into()))?;
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        Ok(line.len() as u64 + 1)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        if let Some(out) = self.out.take() {
            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        std::fs::rename(&self.temp_path, &self.path)?;
        Ok(())
    }
}

impl Drop for FilePartition {
    fn drop(&mut self) {
        if self.out.is_some() {
            self.out = None;
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Keeps committed partitions in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    partitions: Arc<Mutex<BTreeMap<String, Vec<String>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of a committed partition.
    pub fn lines(&self, partition: &str) -> Option<Vec<String>> {
        self.partitions
            .lock()
            .ok()
            .and_then(|p| p.get(partition).cloned())
    }

    /// Names of committed partitions, sorted.
    pub fn partitions(&self) -> Vec<String> {
        self.partitions
            .lock()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn open(&self, partition: &str) -> Result<Box<dyn PartitionWriter>> {
        Ok(Box::new(MemoryPartition {
            name: partition.to_string(),
            lines: Vec::new(),
            partitions: Arc::clone(&self.partitions),
        }))
    }
}

struct MemoryPartition {
    name: String,
    lines: Vec<String>,
    partitions: Arc<Mutex<BTreeMap<String, Vec<String>>>>,
}

impl PartitionWriter for MemoryPartition {
    fn write_line(&mut self, line: &str) -> Result<u64> {
        self.lines.push(line.to_string());
        Ok(line.len() as u64 + 1)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut partitions = self
            .partitions
            .lock()
            .map_err(|_| ExtractError::Config("memory sink lock poisoned".into()))?;
        partitions.insert(self.name, self.lines);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_partition_commit() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut writer = sink.open("raw/table").unwrap();
        assert_eq!(writer.write_line("{\"a\":1}").unwrap(), 8);
        writer.write_line("{\"a\":2}").unwrap();
        writer.commit().unwrap();

        let path = sink.partition_path("raw/table");
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"a\":2}\n");
        assert!(!path.with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn test_rewrite_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        for value in ["first", "second"] {
            let mut writer = sink.open("transformed/column").unwrap();
            writer.write_line(value).unwrap();
            writer.commit().unwrap();
        }

        let content = std::fs::read_to_string(sink.partition_path("transformed/column")).unwrap();
        assert_eq!(content, "second\n");
    }

    #[test]
    fn test_uncommitted_partition_leaves_previous() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let mut writer = sink.open("raw/schema").unwrap();
        writer.write_line("kept").unwrap();
        writer.commit().unwrap();

        let mut abandoned = sink.open("raw/schema").unwrap();
        abandoned.write_line("lost").unwrap();
        drop(abandoned);

        let path = sink.partition_path("raw/schema");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n");
        assert!(!path.with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn test_rejects_bad_partition_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        assert!(sink.open("").is_err());
        assert!(sink.open("../escape").is_err());
        assert!(sink.open("raw//x").is_err());
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        let mut writer = sink.open("raw/table").unwrap();
        writer.write_line("x").unwrap();
        assert!(sink.lines("raw/table").is_none());
        writer.commit().unwrap();
        assert_eq!(sink.lines("raw/table"), Some(vec!["x".to_string()]));
        assert_eq!(sink.partitions(), vec!["raw/table"]);
    }
}

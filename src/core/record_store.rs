//! Append-only execution record store with file-based persistence.
//!
//! Records are stored as newline-delimited JSON (JSONL), one file per task,
//! so the history of a task can be inspected with ordinary tools.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::domain::{Address, ExecutionRecord};

/// File-based record store using JSONL format
#[derive(Debug, Clone)]
pub struct RecordStore {
    /// Directory owned by the task
    task_dir: PathBuf,

    /// Path to the records.jsonl file
    records_path: PathBuf,
}

impl RecordStore {
    /// Create or open the record store of a task under the configured home
    pub async fn open(task: Address) -> Result<Self> {
        let base_dir = crate::config::tasks_dir()?;
        Self::open_in(&base_dir, task).await
    }

    /// Create or open the record store of a task under `base_dir`
    pub async fn open_in(base_dir: &Path, task: Address) -> Result<Self> {
        let task_dir = base_dir.join(task.to_string());

        fs::create_dir_all(&task_dir)
            .await
            .with_context(|| format!("Failed to create task directory: {}", task_dir.display()))?;

        let records_path = task_dir.join("records.jsonl");

        Ok(Self {
            task_dir,
            records_path,
        })
    }

    /// Get the path to the records file
    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    /// Get the task directory
    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    /// Append a record to the log under an exclusive file lock
    pub async fn append(&self, record: &ExecutionRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize record")?;
        let path = self.records_path.clone();

        tokio::task::spawn_blocking(move || append_line(&path, &json))
            .await
            .context("Record append task panicked")?
    }

    /// Replay all records in order
    pub async fn replay(&self) -> Result<Vec<ExecutionRecord>> {
        if !self.records_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.records_path)
            .await
            .with_context(|| format!("Failed to open records file: {}", self.records_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: ExecutionRecord = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse record: {}", line))?;
            records.push(record);
        }

        Ok(records)
    }

    /// Find records matching a predicate
    pub async fn find<F>(&self, predicate: F) -> Result<Vec<ExecutionRecord>>
    where
        F: Fn(&ExecutionRecord) -> bool,
    {
        let records = self.replay().await?;
        Ok(records.into_iter().filter(predicate).collect())
    }

    /// Most recent record, if any
    pub async fn last(&self) -> Result<Option<ExecutionRecord>> {
        let records = self.replay().await?;
        Ok(records.into_iter().last())
    }

    /// List all task addresses with a record directory under `base_dir`
    pub async fn list_tasks(base_dir: &Path) -> Result<Vec<Address>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        let mut entries = fs::read_dir(base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(address) = name.parse::<Address>() {
                        tasks.push(address);
                    }
                }
            }
        }

        tasks.sort();
        Ok(tasks)
    }
}

fn append_line(path: &Path, json: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open records file: {}", path.display()))?;

    file.lock_exclusive()
        .context("Failed to acquire file lock on records.jsonl")?;

    writeln!(file, "{}", json).context("Failed to write record")?;
    file.flush().context("Failed to flush record")?;

    // Lock is released when file is dropped
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Selector, Slippage};
    use tempfile::TempDir;

    fn record(amount: u128) -> ExecutionRecord {
        ExecutionRecord::new(
            Address::from_low_u8(1),
            Address::from_low_u8(2),
            Selector::from_signature("join(address,uint256,uint256)"),
            format!("payload-{}", amount),
            Address::from_low_u8(3),
            amount,
            Slippage::ZERO,
        )
    }

    #[tokio::test]
    async fn test_append_and_replay_order() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open_in(temp.path(), Address::from_low_u8(1))
            .await
            .unwrap();

        for amount in 1..=5 {
            store.append(&record(amount)).await.unwrap();
        }

        let records = store.replay().await.unwrap();
        assert_eq!(records.len(), 5);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.amount, (i + 1) as u128);
        }
        assert_eq!(store.last().await.unwrap().unwrap().amount, 5);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::open_in(temp.path(), Address::from_low_u8(1))
            .await
            .unwrap();

        assert!(store.replay().await.unwrap().is_empty());
        assert!(store.last().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let temp = TempDir::new().unwrap();
        RecordStore::open_in(temp.path(), Address::from_low_u8(2)).await.unwrap();
        RecordStore::open_in(temp.path(), Address::from_low_u8(1)).await.unwrap();
        std::fs::create_dir_all(temp.path().join("not-a-task")).unwrap();

        let tasks = RecordStore::list_tasks(temp.path()).await.unwrap();
        assert_eq!(tasks, vec![Address::from_low_u8(1), Address::from_low_u8(2)]);
    }
}

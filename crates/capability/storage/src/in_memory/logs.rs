//! 日志内存实现

use crate::error::StorageError;
use crate::traits::{LogStore, in_range};
use domain::LogEntry;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryLogStore {
    entries: RwLock<Vec<LogEntry>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(&self) -> Result<Vec<LogEntry>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut sorted = entries.clone();
        sorted.sort_by_key(|entry| entry.timestamp);
        Ok(sorted)
    }
}

#[async_trait::async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, entry: &LogEntry) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn list_range(&self, from: i64, to: Option<i64>) -> Result<Vec<LogEntry>, StorageError> {
        Ok(self
            .sorted()?
            .into_iter()
            .filter(|entry| in_range(entry.timestamp, from, to))
            .collect())
    }

    async fn latest(&self, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let sorted = self.sorted()?;
        let skip = sorted.len().saturating_sub(limit);
        Ok(sorted.into_iter().skip(skip).collect())
    }

    async fn prune_before(&self, before: i64) -> Result<u64, StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let original = entries.len();
        entries.retain(|entry| entry.timestamp >= before);
        Ok((original - entries.len()) as u64)
    }
}

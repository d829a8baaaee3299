//! 读数内存实现

use crate::error::StorageError;
use crate::traits::{ReadingStore, in_range};
use domain::Reading;
use std::sync::RwLock;

/// 读数内存存储
#[derive(Default)]
pub struct InMemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前累计的读数数量（用于测试）
    pub fn len(&self) -> usize {
        self.readings.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        let mut readings = self
            .readings
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        readings.push(reading.clone());
        Ok(())
    }

    async fn query_range(&self, from: i64, to: Option<i64>) -> Result<Vec<Reading>, StorageError> {
        let readings = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut rows: Vec<Reading> = readings
            .iter()
            .filter(|reading| in_range(reading.timestamp, from, to))
            .cloned()
            .collect();
        // 稳定排序：同一时间戳保持写入顺序
        rows.sort_by_key(|reading| reading.timestamp);
        Ok(rows)
    }
}

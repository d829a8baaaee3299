//! 存储接口 Trait 定义
//!
//! - ReadingStore：周期读数（只追加）
//! - LogStore：运行日志（只追加，按时间清理）
//!
//! 时间范围一律为半开区间 `[from, to)`，毫秒时间戳；`to = None` 表示无上界。

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{LogEntry, Reading};

/// 读数存储接口
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// 追加一条读数
    async fn append(&self, reading: &Reading) -> Result<(), StorageError>;

    /// 范围查询，按时间升序，字段原样返回
    async fn query_range(&self, from: i64, to: Option<i64>) -> Result<Vec<Reading>, StorageError>;
}

/// 日志存储接口
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, entry: &LogEntry) -> Result<(), StorageError>;

    /// 范围查询，按时间升序
    async fn list_range(&self, from: i64, to: Option<i64>) -> Result<Vec<LogEntry>, StorageError>;

    /// 最近 `limit` 条，按时间升序
    async fn latest(&self, limit: usize) -> Result<Vec<LogEntry>, StorageError>;

    /// 删除早于 `before` 的条目，返回删除数量
    async fn prune_before(&self, before: i64) -> Result<u64, StorageError>;
}

pub(crate) fn in_range(timestamp: i64, from: i64, to: Option<i64>) -> bool {
    timestamp >= from && to.is_none_or(|to| timestamp < to)
}

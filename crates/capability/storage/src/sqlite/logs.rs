//! SQLite 日志实现

use crate::error::StorageError;
use crate::traits::LogStore;
use domain::{LogEntry, LogLevel};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub struct SqliteLogStore {
    pub pool: SqlitePool,
}

impl SqliteLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<LogEntry, StorageError> {
    let level: String = row.try_get("level")?;
    Ok(LogEntry {
        timestamp: row.try_get("timestamp")?,
        level: LogLevel::parse(&level).unwrap_or(LogLevel::Info),
        message: row.try_get("message")?,
    })
}

#[async_trait::async_trait]
impl LogStore for SqliteLogStore {
    async fn append(&self, entry: &LogEntry) -> Result<(), StorageError> {
        sqlx::query("insert into logs (timestamp, level, message) values (?, ?, ?)")
            .bind(entry.timestamp)
            .bind(entry.level.as_str())
            .bind(&entry.message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_range(&self, from: i64, to: Option<i64>) -> Result<Vec<LogEntry>, StorageError> {
        let rows = match to {
            Some(to) => {
                sqlx::query(
                    "select timestamp, level, message from logs \
                     where timestamp >= ? and timestamp < ? order by timestamp asc, id asc",
                )
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "select timestamp, level, message from logs \
                     where timestamp >= ? order by timestamp asc, id asc",
                )
                .bind(from)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(entry_from_row).collect()
    }

    async fn latest(&self, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "select timestamp, level, message from logs \
             order by timestamp desc, id desc limit ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let mut entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        entries.reverse();
        Ok(entries)
    }

    async fn prune_before(&self, before: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from logs where timestamp < ?")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

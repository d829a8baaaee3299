//! SQLite 读数实现

use crate::error::StorageError;
use crate::traits::ReadingStore;
use domain::Reading;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub struct SqliteReadingStore {
    pub pool: SqlitePool,
}

impl SqliteReadingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn reading_from_row(row: &SqliteRow) -> Result<Reading, StorageError> {
    // 历史数据中的空列按 0 处理
    let column = |name: &str| -> Result<f64, StorageError> {
        Ok(row.try_get::<Option<f64>, _>(name)?.unwrap_or(0.0))
    };
    Ok(Reading {
        timestamp: row.try_get("timestamp")?,
        vlt: column("vlt")?,
        outdoor: column("outdoor")?,
        indoor: column("indoor")?,
        tank: column("tank")?,
        target: column("target")?,
    })
}

#[async_trait::async_trait]
impl ReadingStore for SqliteReadingStore {
    async fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        sqlx::query(
            "insert into readings (timestamp, vlt, outdoor, indoor, tank, target) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(reading.timestamp)
        .bind(reading.vlt)
        .bind(reading.outdoor)
        .bind(reading.indoor)
        .bind(reading.tank)
        .bind(reading.target)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_range(&self, from: i64, to: Option<i64>) -> Result<Vec<Reading>, StorageError> {
        let rows = match to {
            Some(to) => {
                sqlx::query(
                    "select timestamp, vlt, outdoor, indoor, tank, target from readings \
                     where timestamp >= ? and timestamp < ? order by timestamp asc, id asc",
                )
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "select timestamp, vlt, outdoor, indoor, tank, target from readings \
                     where timestamp >= ? order by timestamp asc, id asc",
                )
                .bind(from)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(reading_from_row).collect()
    }
}

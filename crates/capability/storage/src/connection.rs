//! 数据库连接管理
//!
//! - connect_pool：建立 SQLite 连接池
//! - migrate：建表（幂等）

use crate::error::StorageError;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// 建立 SQLite 连接池
///
/// 内存库（`sqlite::memory:`）每个连接各自独立，因此只保留一个长期连接。
pub async fn connect_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };
    let pool = options.connect(database_url).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// 建表与索引
pub async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        "create table if not exists readings (\
            id integer primary key autoincrement, \
            timestamp integer not null, \
            vlt real, \
            outdoor real, \
            indoor real, \
            tank real, \
            target real)",
    )
    .execute(pool)
    .await?;
    sqlx::query("create index if not exists idx_timestamp on readings(timestamp)")
        .execute(pool)
        .await?;
    sqlx::query(
        "create table if not exists logs (\
            id integer primary key autoincrement, \
            timestamp integer not null, \
            level text not null, \
            message text not null)",
    )
    .execute(pool)
    .await?;
    sqlx::query("create index if not exists idx_logs_timestamp on logs(timestamp)")
        .execute(pool)
        .await?;
    Ok(())
}

//! # Bridge Storage 模块
//!
//! 读数与日志的持久化，以及历史查询的窗口解析和聚合。
//!
//! ## 模块说明
//!
//! - [`traits`]：存储接口（`ReadingStore`、`LogStore`），时间区间为 `[from, to)`
//! - [`models`]：历史查询结果（原始行、聚合行、对比结果）
//! - [`history`]：查询模式 → 窗口/分桶/平移，`HistoryEngine`
//! - [`error`]：存储错误类型
//! - [`connection`]：SQLite 连接池与建表
//! - [`in_memory`]：内存实现（测试、无数据库运行）
//! - [`sqlite`]：SQLite 实现
//!
//! 分桶在 Rust 侧按本地时区计算，两种后端结果一致。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use bridge_storage::{HistoryEngine, HistoryMode, SqliteReadingStore, connect_pool};
//!
//! let pool = connect_pool("sqlite://history.db?mode=rwc").await?;
//! let readings = Arc::new(SqliteReadingStore::new(pool));
//! let engine = HistoryEngine::new(readings);
//! let rows = engine.query(HistoryMode::parse("month")).await;
//! ```

pub mod connection;
pub mod error;
pub mod history;
pub mod in_memory;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use history::*;
pub use in_memory::*;
pub use models::*;
pub use sqlite::*;
pub use traits::*;

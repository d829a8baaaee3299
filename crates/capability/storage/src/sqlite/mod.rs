//! # SQLite 存储实现模块
//!
//! 生产环境使用的持久化实现，表结构见 [`crate::connection::migrate`]：
//!
//! - `readings`：周期读数（id, timestamp, vlt, outdoor, indoor, tank, target），`idx_timestamp`
//! - `logs`：运行日志（id, timestamp, level, message），`idx_logs_timestamp`
//!
//! 时间戳均为毫秒整数；所有查询使用参数绑定。

pub mod logs;
pub mod readings;

pub use logs::*;
pub use readings::*;

//! 内存存储实现模块
//!
//! 用于测试，以及未配置数据库时的本地运行。
//!
//! - ReadingStore: InMemoryReadingStore
//! - LogStore: InMemoryLogStore

pub mod logs;
pub mod readings;

pub use logs::*;
pub use readings::*;

//! Handlers 模块

pub mod commands;
pub mod config;
pub mod history;
pub mod live;
pub mod logs;
pub mod metrics;
pub mod status;

pub use commands::*;
pub use config::*;
pub use history::*;
pub use live::*;
pub use logs::*;
pub use metrics::*;
pub use status::*;

//! 桥接器共享领域模型。

pub mod data;
pub mod keys;

pub use data::{DeviceState, LogEntry, LogLevel, Reading, StateValue, now_epoch_ms};
pub use keys::{SemanticKey, UnknownKey};

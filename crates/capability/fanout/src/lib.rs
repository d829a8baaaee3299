//! 外部下游：控制器 UDP 数据报、消息总线、实时界面。
//!
//! 三者都以 `StateObserver` 的形式挂在 `StateStore` 上，拿到的是只读状态。

mod bus;
mod controller;
mod error;
mod ui;

pub use bus::{
    BrokerAddress, BusCommand, BusLink, BusSettings, BusSink, DEFAULT_BROKER_PORT,
    parse_set_topic,
};
pub use controller::{
    ControllerLink, ControllerSink, ControllerTarget, DEFAULT_HEARTBEAT_SECS, Heartbeat,
    MIN_HEARTBEAT_SECS, encode_datagram, heartbeat_interval, is_mode_input, mode_datagram,
};
pub use error::FanoutError;
pub use ui::{UiEvent, UiHub, UiStateObserver};

//! # 设备协议能力模块
//!
//! 面向资源树设备（请求/响应协议，持久 WebSocket）的连接与数据采集：
//!
//! - **envelope**：`m2m:rqp` / `m2m:rsp` 报文编解码
//! - **correlator**：令牌 → 等待者的关联表（有界等待，确定性清理）
//! - **watchdog**：入站静默检测
//! - **poll**：固定路径列表、错开发送的轮询批次
//! - **connection**：连接状态机（单任务 actor）
//! - **websocket**：tokio-tungstenite 传输
//!
//! ## 数据流
//!
//! ```text
//! Connector ─▶ Transport ─▶ ConnectionManager ─┬─▶ Correlator（匹配待决请求）
//!                                               └─▶ FrameHandler（路径映射 → 状态存储）
//! ```

mod connection;
mod correlator;
mod envelope;
mod error;
mod poll;
mod watchdog;
mod websocket;

pub use connection::{
    ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState, Connector,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_DELAY, DEFAULT_REQUEST_TIMEOUT, FrameHandler,
    Transport, TransportEvent,
};
pub use correlator::{Correlator, PendingGuard, READ_TOKEN_PREFIX, Resolved, WRITE_TOKEN_PREFIX};
pub use envelope::{
    InboundFrame, ORIGINATOR, STATUS_OK, parse_frame, retrieve_request, value_from_json,
    value_to_json, write_request,
};
pub use error::ProtocolError;
pub use poll::{DEFAULT_POLL_INTERVAL, DEFAULT_STAGGER, POLL_PATHS, PollScheduler, default_poll_paths};
pub use watchdog::{DEFAULT_WATCHDOG_THRESHOLD, Watchdog};
pub use websocket::{WsConnector, device_url};

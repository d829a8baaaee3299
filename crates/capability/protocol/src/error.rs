//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误（建立失败、被对端关闭）
    #[error("connection error: {0}")]
    Connection(String),

    /// 报文解析错误
    #[error("frame decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// 超时错误（建连超时）
    #[error("timeout: {0}")]
    Timeout(String),

    /// 通道关闭
    #[error("channel closed")]
    ChannelClosed,
}

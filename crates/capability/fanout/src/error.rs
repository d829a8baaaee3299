/// 下游分发错误。
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
    #[error("invalid broker address: {0}")]
    InvalidBroker(String),
    #[error("controller address not resolved: {0}")]
    Unresolved(String),
}

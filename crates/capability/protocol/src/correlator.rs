//! 请求关联表：令牌 → 等待中的一次性回调。

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// 读取请求的令牌前缀。
pub const READ_TOKEN_PREFIX: &str = "req_";

/// 写入请求的令牌前缀（不登记，不等待）。
pub const WRITE_TOKEN_PREFIX: &str = "set_";

struct PendingRequest {
    path: String,
    created_at: Instant,
    waiter: oneshot::Sender<Option<Value>>,
}

/// 匹配成功的待决请求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: String,
    pub elapsed: Duration,
}

/// 请求关联器。
///
/// 同一令牌在待决期间只对应一个等待者；匹配或超时后条目立即移除，
/// 因此迟到或重复的响应找不到条目，会被忽略。
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<String, PendingRequest>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个新请求，返回携带令牌的守卫。
    ///
    /// 守卫释放时（超时、取消或等待结束）条目被移除。
    pub fn register(self: &Arc<Self>, path: &str) -> PendingGuard {
        let (waiter, receiver) = oneshot::channel();
        let mut pending = self.lock();
        let token = loop {
            let candidate = new_token(READ_TOKEN_PREFIX);
            if !pending.contains_key(&candidate) {
                break candidate;
            }
        };
        pending.insert(
            token.clone(),
            PendingRequest {
                path: path.to_string(),
                created_at: Instant::now(),
                waiter,
            },
        );
        drop(pending);

        PendingGuard {
            correlator: Arc::clone(self),
            token,
            receiver: Some(receiver),
        }
    }

    /// 用响应内容结束待决请求。
    ///
    /// 令牌不在待决集合中时返回 `None`。
    pub fn resolve(&self, token: &str, content: Option<&Value>) -> Option<Resolved> {
        let entry = self.lock().remove(token)?;
        let resolved = Resolved {
            path: entry.path,
            elapsed: entry.created_at.elapsed(),
        };
        // 等待者可能已放弃；结果照常返回给调用方
        let _ = entry.waiter.send(content.cloned());
        Some(resolved)
    }

    pub fn is_pending(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().len()
    }

    /// 丢弃全部待决请求，等待者得到 `None`。
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        if !drained.is_empty() {
            debug!(target: "bridge.protocol", count = drained.len(), "pending_requests_dropped");
        }
    }

    fn forget(&self, token: &str) {
        self.lock().remove(token);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        // 锁内不会 panic，中毒时沿用内部数据
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 待决请求守卫。
pub struct PendingGuard {
    correlator: Arc<Correlator>,
    token: String,
    receiver: Option<oneshot::Receiver<Option<Value>>>,
}

impl PendingGuard {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 等待响应，最长 `deadline`；超时或被丢弃时返回 `None`。
    pub async fn wait(mut self, deadline: Duration) -> Option<Value> {
        let receiver = self.receiver.take()?;
        match tokio::time::timeout(deadline, receiver).await {
            Ok(Ok(content)) => content,
            Ok(Err(_)) => None,
            Err(_) => {
                bridge_telemetry::record_request_timeout();
                debug!(target: "bridge.protocol", token = %self.token, "request_timed_out");
                None
            }
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.correlator.forget(&self.token);
    }
}

/// 生成新令牌。
pub fn new_token(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolve_hands_content_to_waiter_once() {
        let correlator = Arc::new(Correlator::new());
        let guard = correlator.register("/a/la");
        let token = guard.token().to_string();
        assert!(token.starts_with(READ_TOKEN_PREFIX));

        let resolved = correlator.resolve(&token, Some(&json!(21.5)));
        assert_eq!(resolved.map(|r| r.path), Some("/a/la".to_string()));
        assert!(correlator.resolve(&token, Some(&json!(22.0))).is_none());

        let value = guard.wait(Duration::from_millis(500)).await;
        assert_eq!(value, Some(json!(21.5)));
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_entry() {
        let correlator = Arc::new(Correlator::new());
        let guard = correlator.register("/a/la");
        let token = guard.token().to_string();

        assert_eq!(guard.wait(Duration::from_millis(200)).await, None);
        assert!(!correlator.is_pending(&token));
        assert!(correlator.resolve(&token, Some(&json!(1))).is_none());
    }

    #[tokio::test]
    async fn tokens_are_unique_while_pending() {
        let correlator = Arc::new(Correlator::new());
        let guards: Vec<_> = (0..64).map(|_| correlator.register("/a/la")).collect();
        let mut tokens: Vec<_> = guards.iter().map(|g| g.token().to_string()).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 64);
        drop(guards);
        assert_eq!(correlator.pending_len(), 0);
    }
}

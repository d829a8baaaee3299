//! 静默看门狗：只以入站帧作为存活信号。

use std::time::Duration;
use tokio::time::Instant;

/// 默认故障阈值（3 分钟）。
pub const DEFAULT_WATCHDOG_THRESHOLD: Duration = Duration::from_secs(180);

/// 入站静默检测。
///
/// 与传输层是否报错无关：半开连接既不报错也不应答，同样会被判定为失效。
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    threshold: Duration,
    last_inbound: Instant,
}

impl Watchdog {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_inbound: now,
        }
    }

    /// 记录一次入站帧（或连接建立）。
    pub fn touch(&mut self, now: Instant) {
        self.last_inbound = now;
    }

    pub fn last_inbound(&self) -> Instant {
        self.last_inbound
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_inbound)
    }

    /// 静默时长达到阈值即失效。
    pub fn is_stale(&self, now: Instant) -> bool {
        self.silence(now) >= self.threshold
    }
}

//! 追踪、日志捕获、计数器与请求 ID 生成。

mod capture;

pub use capture::{LogCaptureLayer, log_capture};

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照（`GET /api/metrics` 的数据源）。
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub frames_undecodable: u64,
    pub responses_applied: u64,
    pub responses_ignored: u64,
    pub requests_timed_out: u64,
    pub poll_batches: u64,
    pub reconnects: u64,
    pub watchdog_trips: u64,
    pub state_changes: u64,
    pub commands_accepted: u64,
    pub commands_rejected: u64,
    pub snapshots_written: u64,
    pub storage_failures: u64,
    pub fanout_sent: u64,
    pub fanout_dropped: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    frames_undecodable: AtomicU64,
    responses_applied: AtomicU64,
    responses_ignored: AtomicU64,
    requests_timed_out: AtomicU64,
    poll_batches: AtomicU64,
    reconnects: AtomicU64,
    watchdog_trips: AtomicU64,
    state_changes: AtomicU64,
    commands_accepted: AtomicU64,
    commands_rejected: AtomicU64,
    snapshots_written: AtomicU64,
    storage_failures: AtomicU64,
    fanout_sent: AtomicU64,
    fanout_dropped: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_undecodable: AtomicU64::new(0),
            responses_applied: AtomicU64::new(0),
            responses_ignored: AtomicU64::new(0),
            requests_timed_out: AtomicU64::new(0),
            poll_batches: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            watchdog_trips: AtomicU64::new(0),
            state_changes: AtomicU64::new(0),
            commands_accepted: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            snapshots_written: AtomicU64::new(0),
            storage_failures: AtomicU64::new(0),
            fanout_sent: AtomicU64::new(0),
            fanout_dropped: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_undecodable: self.frames_undecodable.load(Ordering::Relaxed),
            responses_applied: self.responses_applied.load(Ordering::Relaxed),
            responses_ignored: self.responses_ignored.load(Ordering::Relaxed),
            requests_timed_out: self.requests_timed_out.load(Ordering::Relaxed),
            poll_batches: self.poll_batches.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            watchdog_trips: self.watchdog_trips.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
            commands_accepted: self.commands_accepted.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            fanout_sent: self.fanout_sent.load(Ordering::Relaxed),
            fanout_dropped: self.fanout_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
///
/// 传入捕获层时，`bridge.*` 目标上 INFO 及以上的事件会同时转成运行日志条目。
pub fn init_tracing(capture: Option<LogCaptureLayer>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(capture)
        .try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

pub fn record_frame_received() {
    metrics().frames_received.fetch_add(1, Ordering::Relaxed);
}

pub fn record_frame_sent() {
    metrics().frames_sent.fetch_add(1, Ordering::Relaxed);
}

/// 未连接时被丢弃的出站帧。
pub fn record_frame_dropped() {
    metrics().frames_dropped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_frame_undecodable() {
    metrics().frames_undecodable.fetch_add(1, Ordering::Relaxed);
}

pub fn record_response_applied() {
    metrics().responses_applied.fetch_add(1, Ordering::Relaxed);
}

/// 令牌不在待决集合中的响应（迟到、重复或未知）。
pub fn record_response_ignored() {
    metrics().responses_ignored.fetch_add(1, Ordering::Relaxed);
}

pub fn record_request_timeout() {
    metrics().requests_timed_out.fetch_add(1, Ordering::Relaxed);
}

pub fn record_poll_batch() {
    metrics().poll_batches.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}

pub fn record_watchdog_trip() {
    metrics().watchdog_trips.fetch_add(1, Ordering::Relaxed);
}

pub fn record_state_change() {
    metrics().state_changes.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_accepted() {
    metrics().commands_accepted.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_rejected() {
    metrics().commands_rejected.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_written() {
    metrics().snapshots_written.fetch_add(1, Ordering::Relaxed);
}

pub fn record_storage_failure() {
    metrics().storage_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_fanout_sent() {
    metrics().fanout_sent.fetch_add(1, Ordering::Relaxed);
}

/// 下游不可用或缓冲已满时丢弃的消息。
pub fn record_fanout_dropped() {
    metrics().fanout_dropped.fetch_add(1, Ordering::Relaxed);
}

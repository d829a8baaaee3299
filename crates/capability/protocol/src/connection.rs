//! 连接生命周期管理。
//!
//! `ConnectionManager` 是单个任务（actor）：传输句柄、看门狗、轮询节奏、
//! 重连定时器以及入站帧到状态的应用都只在这个任务里发生。
//! 外部通过可克隆的 [`ConnectionHandle`] 与之交互。
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open──▶ Connected
//!      ▲                        │                   │
//!      └──── 5s 后重连 ◀── 失败/超时 ◀── 关闭/错误/看门狗 ┘
//! ```

use crate::correlator::{Correlator, WRITE_TOKEN_PREFIX, new_token};
use crate::envelope::{InboundFrame, parse_frame, retrieve_request, value_from_json, write_request};
use crate::error::ProtocolError;
use crate::poll::{DEFAULT_POLL_INTERVAL, DEFAULT_STAGGER, PollScheduler, default_poll_paths};
use crate::watchdog::{DEFAULT_WATCHDOG_THRESHOLD, Watchdog};
use async_trait::async_trait;
use domain::StateValue;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 默认重连延迟。
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// 默认建连超时。
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 默认单请求等待上限。
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// 连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// 连接配置。
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// 设备地址（`host` 或 `host:port`）
    pub address: String,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub stagger: Duration,
    pub request_timeout: Duration,
    pub watchdog_threshold: Duration,
    pub poll_paths: Vec<String>,
}

impl ConnectionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stagger: DEFAULT_STAGGER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            watchdog_threshold: DEFAULT_WATCHDOG_THRESHOLD,
            poll_paths: default_poll_paths(),
        }
    }
}

/// 传输层事件。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 一帧文本
    Frame(String),
    /// 传输错误；连接随后被强制终止
    Error(String),
    /// 对端关闭
    Closed,
}

/// 已建立的传输：出站帧通道 + 入站事件通道 + 后台读写任务。
pub struct Transport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Transport {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            tasks,
        }
    }

    fn send(&self, frame: String) -> Result<(), ProtocolError> {
        self.outbound
            .send(frame)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.inbound.recv().await.unwrap_or(TransportEvent::Closed)
    }

    /// 强制终止（非优雅关闭）。
    fn terminate(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// 传输连接器。
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Transport, ProtocolError>;
}

/// 解码后的设备值的接收方（路径映射 + 状态存储）。
///
/// 只在连接任务内被调用，不需要内部同步。
pub trait FrameHandler: Send + 'static {
    fn on_value(&mut self, path: &str, value: StateValue);
}

enum Control {
    Send(String),
    Poll,
    Connect,
    Disconnect,
    SetAddress(String),
    Shutdown,
}

/// 连接管理器的外部句柄。
#[derive(Clone)]
pub struct ConnectionHandle {
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ConnectionState>,
    correlator: Arc<Correlator>,
    request_timeout: Duration,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// 发送一帧；未连接时由连接任务丢弃并记录。
    pub fn send(&self, frame: String) -> Result<(), ProtocolError> {
        self.control
            .send(Control::Send(frame))
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    /// 读取一个资源的最新值，等待最长 `deadline`。
    ///
    /// 超时、未连接或响应无内容时返回 `None`。
    pub async fn request(&self, path: &str, deadline: Duration) -> Option<Value> {
        if !self.is_connected() {
            return None;
        }
        let guard = self.correlator.register(path);
        let frame = match retrieve_request(path, guard.token()) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(target: "bridge.protocol", path, error = %err, "request_encode_failed");
                return None;
            }
        };
        self.send(frame).ok()?;
        guard.wait(deadline).await
    }

    /// 写入（发出即忘，不等待确认）。
    pub fn write(&self, path: &str, value: &StateValue) -> Result<(), ProtocolError> {
        let frame = write_request(path, value, &new_token(WRITE_TOKEN_PREFIX))?;
        self.send(frame)
    }

    /// 立即轮询（仍按错开间隔发送）。
    pub fn poll_now(&self) -> Result<(), ProtocolError> {
        self.control(Control::Poll)
    }

    /// 拆除现有传输并重新建连。
    pub fn connect(&self) -> Result<(), ProtocolError> {
        self.control(Control::Connect)
    }

    /// 断开且不再自动重连，直到下一次 `connect`。
    pub fn disconnect(&self) -> Result<(), ProtocolError> {
        self.control(Control::Disconnect)
    }

    /// 更新设备地址，下一次建连时生效。
    pub fn set_address(&self, address: impl Into<String>) -> Result<(), ProtocolError> {
        self.control(Control::SetAddress(address.into()))
    }

    pub fn shutdown(&self) -> Result<(), ProtocolError> {
        self.control(Control::Shutdown)
    }

    fn control(&self, control: Control) -> Result<(), ProtocolError> {
        self.control
            .send(control)
            .map_err(|_| ProtocolError::ChannelClosed)
    }
}

/// 连接管理器（单任务 actor）。
pub struct ConnectionManager<H> {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    handler: H,
    correlator: Arc<Correlator>,
    handle: ConnectionHandle,
    control: mpsc::UnboundedReceiver<Control>,
    state: watch::Sender<ConnectionState>,
    transport: Option<Transport>,
    watchdog: Watchdog,
    poll: PollScheduler,
    cadence: Option<Interval>,
    reconnect_at: Option<Instant>,
}

impl<H: FrameHandler> ConnectionManager<H> {
    pub fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        handler: H,
    ) -> (Self, ConnectionHandle) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let correlator = Arc::new(Correlator::new());
        let handle = ConnectionHandle {
            control: control_tx,
            state: state_rx,
            correlator: Arc::clone(&correlator),
            request_timeout: config.request_timeout,
        };
        let poll = PollScheduler::new(
            config.poll_paths.clone(),
            config.stagger,
            config.request_timeout,
        );
        let watchdog = Watchdog::new(config.watchdog_threshold, Instant::now());

        let manager = Self {
            config,
            connector,
            handler,
            correlator,
            handle: handle.clone(),
            control: control_rx,
            state: state_tx,
            transport: None,
            watchdog,
            poll,
            cadence: None,
            reconnect_at: None,
        };
        (manager, handle)
    }

    /// 在后台任务中运行。
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// 事件循环；收到 `shutdown` 后返回。
    pub async fn run(mut self) {
        self.connect().await;

        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                control = self.control.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.on_control(control).await,
                },
                event = next_transport_event(&mut self.transport) => self.on_transport_event(event),
                _ = sleep_until_deadline(reconnect_at) => {
                    self.reconnect_at = None;
                    bridge_telemetry::record_reconnect();
                    self.connect().await;
                }
                _ = next_tick(&mut self.cadence) => self.on_poll_tick(),
            }
        }

        self.cadence = None;
        self.teardown();
        self.set_state(ConnectionState::Disconnected);
        info!(target: "bridge.protocol", "connection_manager_stopped");
    }

    async fn on_control(&mut self, control: Control) {
        match control {
            Control::Send(frame) => self.send(frame),
            Control::Poll => self.poll_now(),
            Control::Connect => self.connect().await,
            Control::Disconnect => {
                self.reconnect_at = None;
                self.cadence = None;
                self.teardown();
                self.set_state(ConnectionState::Disconnected);
                info!(target: "bridge.protocol", "connection_closed_on_request");
            }
            Control::SetAddress(address) => {
                info!(target: "bridge.protocol", address = %address, "device_address_updated");
                self.config.address = address;
            }
            Control::Shutdown => {}
        }
    }

    /// 建连；已有传输先被拆除。
    async fn connect(&mut self) {
        self.reconnect_at = None;
        self.teardown();
        self.set_state(ConnectionState::Connecting);

        let address = self.config.address.clone();
        info!(target: "bridge.protocol", address = %address, "connection_opening");

        let timeout = self.config.connect_timeout;
        let attempt = match tokio::time::timeout(timeout, self.connector.connect(&address)).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout(format!(
                "connect not completed within {} ms",
                timeout.as_millis()
            ))),
        };
        match attempt {
            Ok(transport) => self.on_open(transport),
            Err(err) => {
                warn!(target: "bridge.protocol", address = %address, error = %err, "connection_failed");
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    fn on_open(&mut self, transport: Transport) {
        let now = Instant::now();
        self.transport = Some(transport);
        self.watchdog.touch(now);
        self.set_state(ConnectionState::Connected);
        info!(target: "bridge.protocol", address = %self.config.address, "connection_opened");

        // 首个 tick 立即触发，随后按周期
        let mut cadence = tokio::time::interval_at(now, self.config.poll_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.cadence = Some(cadence);
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.on_frame(&text),
            TransportEvent::Error(reason) => {
                error!(target: "bridge.protocol", reason = %reason, "transport_error");
                self.on_closed();
            }
            TransportEvent::Closed => self.on_closed(),
        }
    }

    /// 关闭处理：每条传输只执行一次（之后 `transport` 为空，不再产生事件）。
    fn on_closed(&mut self) {
        let was_connected = self.state() == ConnectionState::Connected;
        self.teardown();
        self.set_state(ConnectionState::Disconnected);
        if was_connected {
            warn!(target: "bridge.protocol", address = %self.config.address, "connection_lost");
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        // 覆盖旧的截止时间：同一时刻最多一个待执行的重连
        self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay);
        debug!(
            target: "bridge.protocol",
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "reconnect_scheduled"
        );
    }

    fn teardown(&mut self) {
        self.poll.cancel();
        self.correlator.clear();
        if let Some(transport) = self.transport.take() {
            transport.terminate();
        }
    }

    fn on_poll_tick(&mut self) {
        let now = Instant::now();
        if self.transport.is_some() && self.watchdog.is_stale(now) {
            bridge_telemetry::record_watchdog_trip();
            error!(
                target: "bridge.protocol",
                silence_secs = self.watchdog.silence(now).as_secs(),
                "watchdog_expired"
            );
            self.on_closed();
            return;
        }
        if self.state() != ConnectionState::Connected {
            debug!(target: "bridge.protocol", "poll_skipped_disconnected");
            return;
        }
        self.poll.dispatch(self.handle.clone(), false);
    }

    fn poll_now(&mut self) {
        if self.state() != ConnectionState::Connected {
            info!(target: "bridge.protocol", "poll_skipped_disconnected");
            return;
        }
        self.poll.dispatch(self.handle.clone(), true);
    }

    fn send(&mut self, frame: String) {
        let sent = match (&self.transport, self.state()) {
            (Some(transport), ConnectionState::Connected) => transport.send(frame).is_ok(),
            _ => false,
        };
        if sent {
            bridge_telemetry::record_frame_sent();
        } else {
            bridge_telemetry::record_frame_dropped();
            debug!(target: "bridge.protocol", "frame_dropped_disconnected");
        }
    }

    fn on_frame(&mut self, text: &str) {
        // 任何入站帧都是存活信号
        self.watchdog.touch(Instant::now());
        bridge_telemetry::record_frame_received();

        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(err) => {
                bridge_telemetry::record_frame_undecodable();
                warn!(target: "bridge.protocol", error = %err, "frame_decode_failed");
                return;
            }
        };

        match frame {
            InboundFrame::Response {
                token: Some(token),
                path,
                status,
                content,
            } => {
                let Some(resolved) = self.correlator.resolve(&token, content.as_ref()) else {
                    bridge_telemetry::record_response_ignored();
                    debug!(target: "bridge.protocol", token = %token, "response_ignored");
                    return;
                };
                match content {
                    Some(content) => {
                        bridge_telemetry::record_response_applied();
                        let path = path.unwrap_or(resolved.path);
                        self.handler.on_value(&path, value_from_json(&content));
                    }
                    None => debug!(
                        target: "bridge.protocol",
                        path = %resolved.path,
                        status = ?status,
                        "response_without_content"
                    ),
                }
            }
            // 无令牌的响应是设备主动推送
            InboundFrame::Response {
                token: None,
                path: Some(path),
                content: Some(content),
                ..
            }
            | InboundFrame::Notification { path, content } => {
                self.handler.on_value(&path, value_from_json(&content));
            }
            InboundFrame::Response { .. } | InboundFrame::Ignored => {}
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

async fn next_transport_event(transport: &mut Option<Transport>) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(cadence: &mut Option<Interval>) {
    match cadence {
        Some(cadence) => {
            cadence.tick().await;
        }
        None => std::future::pending().await,
    }
}

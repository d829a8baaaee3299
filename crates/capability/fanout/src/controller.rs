//! 控制器下游：每个变化键一个 UDP 文本数据报 `WP_<key>: <value>`。

use crate::error::FanoutError;
use bridge_pipeline::{PipelineError, StateChange, StateObserver, StateReader};
use domain::{DeviceState, SemanticKey, StateValue};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 心跳最小间隔；低于此值按默认值处理。
pub const MIN_HEARTBEAT_SECS: u64 = 10;

pub const DEFAULT_HEARTBEAT_SECS: u64 = 90;

/// 数据报目标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTarget {
    pub addr: SocketAddr,
    /// 文本值转数字（on→1、cooling→2 等）
    pub convert_text_to_num: bool,
}

/// 渲染一个键的数据报。
pub fn encode_datagram(key: &str, value: &StateValue, convert_text_to_num: bool) -> String {
    let rendered = if convert_text_to_num {
        coerce(value).unwrap_or_else(|| value.to_string())
    } else {
        value.to_string()
    };
    format!("WP_{}: {}", key, rendered)
}

/// 组合模式数据报。
pub fn mode_datagram(mode: u8) -> String {
    format!("WP_Mode: {}", mode)
}

fn coerce(value: &StateValue) -> Option<String> {
    let number = match value {
        StateValue::Bool(true) => 1,
        StateValue::Bool(false) => 0,
        StateValue::Text(text) => match text.as_str() {
            "on" | "heating" => 1,
            "standby" => 0,
            "cooling" => 2,
            "auto" => 3,
            _ => return None,
        },
        _ => return None,
    };
    Some(number.to_string())
}

/// 心跳间隔：缺失或低于 10 s 时取 90 s。
pub fn heartbeat_interval(secs: Option<u64>) -> Duration {
    match secs {
        Some(secs) if secs >= MIN_HEARTBEAT_SECS => Duration::from_secs(secs),
        _ => Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
    }
}

/// 控制器链路（可克隆，目标可在运行中替换）。
///
/// 观察者回调是同步的：数据报先入队，由发送任务按顺序写出。
/// 所有克隆释放后发送任务随队列关闭而退出。
#[derive(Clone)]
pub struct ControllerLink {
    outbox: mpsc::UnboundedSender<(SocketAddr, String)>,
    target: Arc<RwLock<Option<ControllerTarget>>>,
}

impl ControllerLink {
    /// 绑定本地临时端口并启动发送任务。
    pub async fn bind() -> Result<Self, FanoutError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let (outbox, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_sender(socket, queue));
        Ok(Self {
            outbox,
            target: Arc::new(RwLock::new(None)),
        })
    }

    /// 解析主机名并替换目标；主机为空时停用下游。
    pub async fn retarget(
        &self,
        host: &str,
        port: u16,
        convert_text_to_num: bool,
    ) -> Result<(), FanoutError> {
        let target = if host.trim().is_empty() {
            None
        } else {
            let addr = tokio::net::lookup_host((host.trim(), port))
                .await?
                .next()
                .ok_or_else(|| FanoutError::Unresolved(host.to_string()))?;
            Some(ControllerTarget {
                addr,
                convert_text_to_num,
            })
        };
        info!(target: "bridge.fanout", host, port, "controller_target_updated");
        self.set_target(target);
        Ok(())
    }

    pub fn set_target(&self, target: Option<ControllerTarget>) {
        match self.target.write() {
            Ok(mut guard) => *guard = target,
            Err(poisoned) => *poisoned.into_inner() = target,
        }
    }

    pub fn target(&self) -> Option<ControllerTarget> {
        match self.target.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn send_value(&self, key: SemanticKey, value: &StateValue) {
        let Some(target) = self.target() else {
            return;
        };
        let datagram = encode_datagram(key.as_str(), value, target.convert_text_to_num);
        self.send_to(target.addr, datagram);
    }

    pub fn send_mode(&self, mode: u8) {
        if let Some(target) = self.target() {
            self.send_to(target.addr, mode_datagram(mode));
        }
    }

    /// 全量重发：每个键一个数据报，最后补 `WP_Mode`。
    pub fn send_state(&self, state: &DeviceState) {
        for (key, value) in state.iter() {
            self.send_value(key, value);
        }
        self.send_mode(state.mode_int());
    }

    fn send_to(&self, addr: SocketAddr, datagram: String) {
        if self.outbox.send((addr, datagram)).is_err() {
            bridge_telemetry::record_fanout_dropped();
            debug!(target: "bridge.fanout", %addr, "datagram_sender_stopped");
        }
    }
}

async fn run_sender(socket: UdpSocket, mut queue: mpsc::UnboundedReceiver<(SocketAddr, String)>) {
    while let Some((addr, datagram)) = queue.recv().await {
        match socket.send_to(datagram.as_bytes(), addr).await {
            Ok(_) => bridge_telemetry::record_fanout_sent(),
            Err(err) => {
                bridge_telemetry::record_fanout_dropped();
                debug!(target: "bridge.fanout", %addr, error = %err, "datagram_dropped");
            }
        }
    }
}

/// 状态观察者：把变化推给控制器。
pub struct ControllerSink {
    link: ControllerLink,
}

impl ControllerSink {
    pub fn new(link: ControllerLink) -> Self {
        Self { link }
    }
}

impl StateObserver for ControllerSink {
    fn name(&self) -> &str {
        "controller"
    }

    fn on_change(&mut self, change: &StateChange, state: &DeviceState) -> Result<(), PipelineError> {
        self.link.send_value(change.key, &change.value);
        if is_mode_input(change.key) {
            self.link.send_mode(state.mode_int());
        }
        Ok(())
    }
}

/// Power_Heating / Mode 变化时需重发组合模式。
pub fn is_mode_input(key: SemanticKey) -> bool {
    matches!(key, SemanticKey::PowerHeating | SemanticKey::Mode)
}

/// 周期全量重发。
pub struct Heartbeat {
    link: ControllerLink,
    state: StateReader,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn new(link: ControllerLink, state: StateReader) -> Self {
        Self {
            link,
            state,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// 以新间隔重启；旧任务先停止。
    pub fn restart(&mut self, secs: Option<u64>) {
        self.stop();
        let period = heartbeat_interval(secs);
        let link = self.link.clone();
        let state = self.state.clone();
        info!(target: "bridge.fanout", period_secs = period.as_secs(), "heartbeat_started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = state.snapshot();
                if snapshot.is_empty() {
                    continue;
                }
                link.send_state(&snapshot);
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

//! 运行时装配：设备帧 → 状态存储、下游副作用、后台周期任务。

use bridge_config::BridgeSettings;
use bridge_control::{CommandService, normalize_command_argument};
use bridge_fanout::{BusCommand, BusLink, BusSettings, ControllerLink, Heartbeat, UiEvent, UiHub};
use bridge_normalize::PathMapper;
use bridge_pipeline::{StateReader, StateStore, snapshot_reading};
use bridge_protocol::{ConnectionHandle, FrameHandler};
use bridge_storage::{LogStore, ReadingStore};
use domain::{LogEntry, StateValue, now_epoch_ms};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// 设备帧处理：路径映射后写入状态存储。
///
/// 状态存储只在连接任务内被写入。
pub struct DeviceFrameHandler {
    mapper: PathMapper,
    store: StateStore,
}

impl DeviceFrameHandler {
    pub fn new(mapper: PathMapper, store: StateStore) -> Self {
        Self { mapper, store }
    }
}

impl FrameHandler for DeviceFrameHandler {
    fn on_value(&mut self, path: &str, value: StateValue) {
        let Some(mapped) = self.mapper.map(path, value) else {
            return;
        };
        let rendered = mapped.value.to_string();
        if self.store.apply(mapped.key, mapped.value) {
            info!(target: "bridge.state", key = %mapped.key, value = %rendered, "value_updated");
        }
    }
}

/// 设置驱动的下游（控制器、总线、心跳）。
#[derive(Clone)]
pub struct Downstream {
    pub controller: ControllerLink,
    pub bus: BusLink,
    heartbeat: Arc<Mutex<Heartbeat>>,
}

impl Downstream {
    pub fn new(controller: ControllerLink, bus: BusLink, state: StateReader) -> Self {
        let heartbeat = Heartbeat::new(controller.clone(), state);
        Self {
            controller,
            bus,
            heartbeat: Arc::new(Mutex::new(heartbeat)),
        }
    }

    /// 应用设置：设备地址（下次建连生效）、控制器目标、总线重连、心跳重启。
    pub async fn apply_settings(&self, settings: &BridgeSettings, link: &ConnectionHandle) {
        if let Err(err) = link.set_address(settings.device_address.clone()) {
            warn!(target: "bridge.api", error = %err, "device_address_update_failed");
        }
        if let Err(err) = self
            .controller
            .retarget(
                &settings.controller_host,
                settings.controller_port,
                settings.convert_text_to_num,
            )
            .await
        {
            warn!(target: "bridge.fanout", error = %err, "controller_retarget_failed");
        }
        if let Err(err) = self.bus.connect(&bus_settings(settings)) {
            warn!(target: "bridge.fanout", error = %err, "bus_connect_failed");
        }
        self.heartbeat.lock().await.restart(settings.heartbeat_secs);
    }

    pub async fn shutdown(&self) {
        self.heartbeat.lock().await.stop();
        self.bus.disconnect();
    }
}

pub fn bus_settings(settings: &BridgeSettings) -> BusSettings {
    let optional = |value: &str| Some(value.to_string()).filter(|v| !v.is_empty());
    BusSettings {
        broker: settings.bus_broker.clone(),
        topic: settings.bus_topic.clone(),
        username: optional(&settings.bus_username),
        password: optional(&settings.bus_password),
    }
}

/// 捕获的日志：持久化并推送到界面。
pub fn spawn_log_sink(
    mut entries: mpsc::UnboundedReceiver<LogEntry>,
    logs: Arc<dyn LogStore>,
    ui: UiHub,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(entry) = entries.recv().await {
            if let Err(err) = logs.append(&entry).await {
                bridge_telemetry::record_storage_failure();
                // 不使用 bridge.* 目标，避免失败日志再次被捕获
                warn!(target: "log_sink", error = %err, "log_persist_failed");
            }
            ui.publish(UiEvent::Log(entry));
        }
    })
}

/// 周期快照：VLT 已知时追加一条读数。
pub fn spawn_snapshots(
    state: StateReader,
    readings: Arc<dyn ReadingStore>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(reading) = snapshot_reading(&state.snapshot(), now_epoch_ms()) else {
                continue;
            };
            match readings.append(&reading).await {
                Ok(()) => bridge_telemetry::record_snapshot_written(),
                Err(err) => {
                    bridge_telemetry::record_storage_failure();
                    warn!(target: "bridge.storage", error = %err, "snapshot_persist_failed");
                }
            }
        }
    })
}

/// 每日清理过期日志；保留天数为 0 时不启动。
pub fn spawn_log_retention(logs: Arc<dyn LogStore>, retention_days: u64) -> Option<JoinHandle<()>> {
    if retention_days == 0 {
        return None;
    }
    let retention_ms = i64::try_from(retention_days)
        .unwrap_or(i64::MAX)
        .saturating_mul(DAY_MS);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DAY);
        loop {
            ticker.tick().await;
            let before = now_epoch_ms().saturating_sub(retention_ms);
            match logs.prune_before(before).await {
                Ok(removed) => {
                    info!(target: "bridge.storage", removed, retention_days, "logs_pruned")
                }
                Err(err) => {
                    bridge_telemetry::record_storage_failure();
                    warn!(target: "bridge.storage", error = %err, "log_prune_failed");
                }
            }
        }
    }))
}

/// 总线命令：与 HTTP 命令走同一条链路（含参数预处理和补轮询）。
pub fn spawn_bus_commands(
    mut commands: mpsc::UnboundedReceiver<BusCommand>,
    service: CommandService,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let argument = normalize_command_argument(&command.name, &command.argument);
            // 失败已在命令服务内记录
            let _ = service.execute(&command.name, &argument).await;
        }
    })
}

/// 总线连接状态 → 界面。
pub fn spawn_bus_status(mut status: watch::Receiver<bool>, ui: UiHub) -> JoinHandle<()> {
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let connected = *status.borrow_and_update();
            ui.publish(UiEvent::MqttStatus { connected });
        }
    })
}

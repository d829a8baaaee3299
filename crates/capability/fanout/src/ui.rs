//! 实时界面推送：`{type, data}` 事件广播。

use bridge_pipeline::{PipelineError, StateChange, StateObserver};
use domain::{DeviceState, LogEntry};
use serde::Serialize;
use tokio::sync::broadcast;

const UI_CHANNEL_CAPACITY: usize = 128;

/// 推送给界面的事件。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum UiEvent {
    State(DeviceState),
    Log(LogEntry),
    MqttStatus { connected: bool },
}

impl UiEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 界面事件中心；慢客户端落后时丢弃旧事件。
#[derive(Clone)]
pub struct UiHub {
    sender: broadcast::Sender<UiEvent>,
}

impl UiHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(UI_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: UiEvent) {
        // 没有客户端时丢弃
        let _ = self.sender.send(event);
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for UiHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 状态观察者：每次变化推送完整状态。
pub struct UiStateObserver {
    hub: UiHub,
}

impl UiStateObserver {
    pub fn new(hub: UiHub) -> Self {
        Self { hub }
    }
}

impl StateObserver for UiStateObserver {
    fn name(&self) -> &str {
        "ui"
    }

    fn on_change(&mut self, _change: &StateChange, state: &DeviceState) -> Result<(), PipelineError> {
        self.hub.publish(UiEvent::State(state.clone()));
        Ok(())
    }
}

//! 设备状态存储：变化检测、同步观察者、广播订阅与只读快照。

mod snapshot;

pub use snapshot::snapshot_reading;

use domain::{DeviceState, SemanticKey, StateValue, now_epoch_ms};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// 广播通道容量（慢订阅者超过容量会收到 `Lagged`）。
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Pipeline 处理错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("observer {name} failed: {reason}")]
    Observer { name: String, reason: String },
}

/// 一次状态变化。
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: SemanticKey,
    pub previous: Option<StateValue>,
    pub value: StateValue,
    pub changed_at_ms: i64,
}

/// 同步观察者。
///
/// 在状态写入之后、同一调用内被通知，因此观察者看到的状态已包含本次变化。
/// 观察者之间互相隔离：一个失败只记录日志，不影响其他观察者。
pub trait StateObserver: Send {
    fn name(&self) -> &str;

    fn on_change(&mut self, change: &StateChange, state: &DeviceState) -> Result<(), PipelineError>;
}

/// 设备状态的唯一写入方。
pub struct StateStore {
    state: DeviceState,
    observers: Vec<Box<dyn StateObserver>>,
    changes: broadcast::Sender<StateChange>,
    snapshot: watch::Sender<DeviceState>,
}

impl StateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (snapshot, _) = watch::channel(DeviceState::new());
        Self {
            state: DeviceState::new(),
            observers: Vec::new(),
            changes,
            snapshot,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn with_observer(mut self, observer: Box<dyn StateObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    /// 订阅变化事件。
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// 只读快照句柄（可跨任务克隆）。
    pub fn reader(&self) -> StateReader {
        StateReader {
            snapshot: self.snapshot.subscribe(),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// 写入一个值；仅当值与已存值不等时通知，返回是否发生变化。
    ///
    /// 相等时仍然覆盖（状态始终保存最新原始值），但不通知下游。
    pub fn apply(&mut self, key: SemanticKey, value: StateValue) -> bool {
        let previous = self.state.insert(key, value.clone());
        if previous.as_ref() == Some(&value) {
            return false;
        }

        bridge_telemetry::record_state_change();
        debug!(
            target: "bridge.state",
            key = %key,
            value = %value,
            previous = ?previous,
            "state_changed"
        );

        let change = StateChange {
            key,
            previous,
            value,
            changed_at_ms: now_epoch_ms(),
        };
        self.snapshot.send_replace(self.state.clone());

        for observer in self.observers.iter_mut() {
            if let Err(err) = observer.on_change(&change, &self.state) {
                warn!(
                    target: "bridge.state",
                    observer = observer.name(),
                    key = %change.key,
                    error = %err,
                    "observer_failed"
                );
            }
        }
        // 没有订阅者时发送失败，忽略
        let _ = self.changes.send(change);
        true
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 状态只读视图。
#[derive(Debug, Clone)]
pub struct StateReader {
    snapshot: watch::Receiver<DeviceState>,
}

impl StateReader {
    /// 当前状态的副本。
    pub fn snapshot(&self) -> DeviceState {
        self.snapshot.borrow().clone()
    }

    pub fn get(&self, key: SemanticKey) -> Option<StateValue> {
        self.snapshot.borrow().get(key).cloned()
    }

    pub fn mode_int(&self) -> u8 {
        self.snapshot.borrow().mode_int()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.borrow().is_empty()
    }

    /// 等待下一次变化；写入方释放后返回 `false`。
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }
}

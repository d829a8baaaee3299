//! 消息总线下游（MQTT）
//!
//! - 状态变化发布到 `<topic>/<key>`，组合模式发布到 `<topic>/Mode_Int`
//! - 订阅 `<topic>/set/#`，`<topic>/set/<command>` 的载荷作为命令参数
//! - 连接状态通过 `watch` 通道对外暴露

use crate::controller::is_mode_input;
use crate::error::FanoutError;
use bridge_pipeline::{PipelineError, StateChange, StateObserver};
use domain::{DeviceState, SemanticKey, StateValue};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_BROKER_PORT: u16 = 1883;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 10;

/// 总线连接参数。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusSettings {
    /// `mqtt://host:port`、`host:port` 或 `host`；为空表示不启用
    pub broker: String,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// 解析代理地址；空串返回 `None`。
    pub fn parse(raw: &str) -> Result<Option<Self>, FanoutError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let without_scheme = ["mqtt://", "tcp://"]
            .iter()
            .find_map(|scheme| trimmed.strip_prefix(scheme))
            .unwrap_or(trimmed)
            .trim_end_matches('/');
        let (host, port) = match without_scheme.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| FanoutError::InvalidBroker(raw.to_string()))?;
                (host, port)
            }
            None => (without_scheme, DEFAULT_BROKER_PORT),
        };
        if host.is_empty() {
            return Err(FanoutError::InvalidBroker(raw.to_string()));
        }
        Ok(Some(Self {
            host: host.to_string(),
            port,
        }))
    }
}

/// 从总线收到的命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCommand {
    pub name: String,
    pub argument: String,
}

/// `<root>/set/<command>` → `command`
pub fn parse_set_topic<'a>(root: &str, topic: &'a str) -> Option<&'a str> {
    let rest = topic.strip_prefix(root.trim_end_matches('/'))?;
    let name = rest.strip_prefix("/set/")?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name)
}

struct Session {
    client: AsyncClient,
    topic: String,
    task: JoinHandle<()>,
}

/// 总线链路（可克隆）。
#[derive(Clone)]
pub struct BusLink {
    session: Arc<Mutex<Option<Session>>>,
    status: Arc<watch::Sender<bool>>,
    commands: mpsc::UnboundedSender<BusCommand>,
}

impl BusLink {
    pub fn new(commands: mpsc::UnboundedSender<BusCommand>) -> Self {
        let (status, _) = watch::channel(false);
        Self {
            session: Arc::new(Mutex::new(None)),
            status: Arc::new(status),
            commands,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// 按新参数重建连接；未配置代理时只断开旧连接。
    pub fn connect(&self, settings: &BusSettings) -> Result<(), FanoutError> {
        self.disconnect();
        let Some(broker) = BrokerAddress::parse(&settings.broker)? else {
            debug!(target: "bridge.fanout", "bus_disabled");
            return Ok(());
        };

        let client_id = format!("heatpump-bridge-{}", uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = settings.username.as_deref().filter(|u| !u.is_empty()) {
            options.set_credentials(username, settings.password.as_deref().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let topic = settings.topic.trim_end_matches('/').to_string();
        info!(
            target: "bridge.fanout",
            host = %broker.host,
            port = broker.port,
            topic = %topic,
            "bus_connecting"
        );
        let task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            topic.clone(),
            Arc::clone(&self.status),
            self.commands.clone(),
        ));
        *self.lock() = Some(Session {
            client,
            topic,
            task,
        });
        Ok(())
    }

    pub fn disconnect(&self) {
        let Some(session) = self.lock().take() else {
            return;
        };
        session.task.abort();
        let _ = session.client.try_disconnect();
        if self.status.send_replace(false) {
            info!(target: "bridge.fanout", "bus_disconnected");
        }
    }

    pub fn publish_value(&self, key: SemanticKey, value: &StateValue) {
        self.publish(key.as_str(), value.to_string());
    }

    pub fn publish_mode(&self, mode: u8) {
        self.publish("Mode_Int", mode.to_string());
    }

    fn publish(&self, suffix: &str, payload: String) {
        if !self.is_connected() {
            return;
        }
        let guard = self.lock();
        let Some(session) = guard.as_ref() else {
            return;
        };
        let topic = format!("{}/{}", session.topic, suffix);
        match session
            .client
            .try_publish(topic.as_str(), QoS::AtMostOnce, false, payload)
        {
            Ok(()) => bridge_telemetry::record_fanout_sent(),
            Err(err) => {
                bridge_telemetry::record_fanout_dropped();
                debug!(target: "bridge.fanout", topic = %topic, error = %err, "bus_publish_dropped");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topic: String,
    status: Arc<watch::Sender<bool>>,
    commands: mpsc::UnboundedSender<BusCommand>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                status.send_replace(true);
                info!(target: "bridge.fanout", topic = %topic, "bus_connected");
                let filter = format!("{}/set/#", topic);
                if let Err(err) = client.try_subscribe(filter, QoS::AtMostOnce) {
                    warn!(target: "bridge.fanout", error = %err, "bus_subscribe_failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(name) = parse_set_topic(&topic, &publish.topic) else {
                    continue;
                };
                let argument = String::from_utf8_lossy(&publish.payload).trim().to_string();
                info!(target: "bridge.fanout", command = name, argument = %argument, "bus_command_received");
                let command = BusCommand {
                    name: name.to_string(),
                    argument,
                };
                if commands.send(command).is_err() {
                    debug!(target: "bridge.fanout", "bus_command_receiver_closed");
                }
            }
            Ok(_) => {}
            Err(err) => {
                if status.send_replace(false) {
                    warn!(target: "bridge.fanout", error = %err, "bus_connection_lost");
                } else {
                    debug!(target: "bridge.fanout", error = %err, "bus_connect_failed");
                }
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// 状态观察者：把变化发布到总线。
pub struct BusSink {
    link: BusLink,
}

impl BusSink {
    pub fn new(link: BusLink) -> Self {
        Self { link }
    }
}

impl StateObserver for BusSink {
    fn name(&self) -> &str {
        "bus"
    }

    fn on_change(&mut self, change: &StateChange, state: &DeviceState) -> Result<(), PipelineError> {
        self.link.publish_value(change.key, &change.value);
        if is_mode_input(change.key) {
            self.link.publish_mode(state.mode_int());
        }
        Ok(())
    }
}

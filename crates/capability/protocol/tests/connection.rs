use async_trait::async_trait;
use bridge_protocol::{
    ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState, Connector,
    FrameHandler, ProtocolError, Transport, TransportEvent,
};
use domain::StateValue;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// 测试侧的"设备"：收到桥接器发出的帧，并可回送事件。
struct DevicePeer {
    requests: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl DevicePeer {
    async fn next_request(&mut self) -> Value {
        let text = self.requests.recv().await.expect("request frame");
        serde_json::from_str(&text).expect("json frame")
    }

    fn respond(&self, request: &Value, content: Value) {
        let rqp = &request["m2m:rqp"];
        self.push(json!({"m2m:rsp": {
            "fr": rqp["to"],
            "rqi": rqp["rqi"],
            "rsc": 2000,
            "pc": {"m2m:cin": {"con": content}}
        }}));
    }

    fn push(&self, frame: Value) {
        self.events
            .send(TransportEvent::Frame(frame.to_string()))
            .expect("push frame");
    }
}

/// 通道连接器：前 `failures` 次建连失败，之后每次建连交出一个 `DevicePeer`。
struct ChannelConnector {
    peers: mpsc::UnboundedSender<DevicePeer>,
    attempts: AtomicUsize,
    failures: usize,
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, _address: &str) -> Result<Transport, ProtocolError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(ProtocolError::Connection("refused".to_string()));
        }
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.peers
            .send(DevicePeer {
                requests: outbound_rx,
                events: inbound_tx,
            })
            .map_err(|_| ProtocolError::ChannelClosed)?;
        Ok(Transport::new(outbound_tx, inbound_rx, Vec::new()))
    }
}

#[derive(Clone, Default)]
struct RecordingHandler {
    values: Arc<Mutex<Vec<(String, StateValue)>>>,
}

impl RecordingHandler {
    fn values(&self) -> Vec<(String, StateValue)> {
        self.values.lock().expect("lock").clone()
    }
}

impl FrameHandler for RecordingHandler {
    fn on_value(&mut self, path: &str, value: StateValue) {
        self.values
            .lock()
            .expect("lock")
            .push((path.to_string(), value));
    }
}

struct Harness {
    handle: ConnectionHandle,
    peers: mpsc::UnboundedReceiver<DevicePeer>,
    handler: RecordingHandler,
    connector: Arc<ChannelConnector>,
}

fn start(failures: usize) -> Harness {
    let (peers_tx, peers_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(ChannelConnector {
        peers: peers_tx,
        attempts: AtomicUsize::new(0),
        failures,
    });
    let handler = RecordingHandler::default();
    let (manager, handle) = ConnectionManager::new(
        ConnectionConfig::new("device.local"),
        connector.clone(),
        handler.clone(),
    );
    manager.spawn();
    Harness {
        handle,
        peers: peers_rx,
        handler,
        connector,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn response_is_applied_at_most_once() {
    let mut harness = start(0);
    let mut peer = harness.peers.recv().await.expect("peer");

    let first = peer.next_request().await;
    assert_eq!(first["m2m:rqp"]["op"], json!(2));
    assert_eq!(first["m2m:rqp"]["fr"], json!("/S"));
    assert_eq!(
        first["m2m:rqp"]["to"],
        json!("/[0]/MNAE/1/Sensor/IndoorTemperature/la")
    );

    peer.respond(&first, json!(21.5));
    peer.respond(&first, json!(99.0));
    peer.push(json!({"m2m:rsp": {
        "fr": "/[0]/MNAE/1/Sensor/IndoorTemperature/la",
        "rqi": "req_unknown",
        "rsc": 2000,
        "pc": {"m2m:cin": {"con": 42.0}}
    }}));
    settle().await;

    assert_eq!(
        harness.handler.values(),
        vec![(
            "/[0]/MNAE/1/Sensor/IndoorTemperature/la".to_string(),
            StateValue::Number(21.5)
        )]
    );
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn late_response_after_timeout_is_ignored() {
    let mut harness = start(0);
    let mut peer = harness.peers.recv().await.expect("peer");

    let first = peer.next_request().await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    peer.respond(&first, json!(21.5));
    settle().await;

    assert!(harness.handler.values().is_empty());
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn batch_requests_are_staggered_in_order() {
    let mut harness = start(0);
    let mut peer = harness.peers.recv().await.expect("peer");

    let started = Instant::now();
    let first = peer.next_request().await;
    let second = peer.next_request().await;
    let second_at = started.elapsed();
    let third = peer.next_request().await;
    let third_at = started.elapsed();

    assert!(first["m2m:rqp"]["to"].as_str().expect("to").contains("IndoorTemperature"));
    assert!(second["m2m:rqp"]["to"].as_str().expect("to").contains("OutdoorTemperature"));
    assert!(third["m2m:rqp"]["to"].as_str().expect("to").contains("TankTemperature"));
    assert!(second_at >= Duration::from_millis(200));
    assert!(third_at >= Duration::from_millis(400));
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn unsolicited_notification_is_applied() {
    let mut harness = start(0);
    let peer = harness.peers.recv().await.expect("peer");

    peer.push(json!({"m2m:rqp": {
        "op": 5,
        "to": "/[0]/MNAE/1/Operation/Power/la",
        "pc": {"m2m:cin": {"con": "on"}}
    }}));
    settle().await;

    assert_eq!(
        harness.handler.values(),
        vec![(
            "/[0]/MNAE/1/Operation/Power/la".to_string(),
            StateValue::text("on")
        )]
    );
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_close_with_delay() {
    let mut harness = start(0);
    let peer = harness.peers.recv().await.expect("peer");
    assert_eq!(harness.handle.state(), ConnectionState::Connected);

    let closed_at = Instant::now();
    peer.events.send(TransportEvent::Closed).expect("close");
    settle().await;
    assert_eq!(harness.handle.state(), ConnectionState::Disconnected);

    let _second = harness.peers.recv().await.expect("second peer");
    assert!(closed_at.elapsed() >= Duration::from_secs(5));
    assert_eq!(harness.connector.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(harness.handle.state(), ConnectionState::Connected);
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn transport_error_closes_once() {
    let mut harness = start(0);
    let peer = harness.peers.recv().await.expect("peer");

    peer.events
        .send(TransportEvent::Error("reset by peer".to_string()))
        .expect("error");
    peer.events.send(TransportEvent::Closed).expect("close");

    let _second = harness.peers.recv().await.expect("second peer");
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.connector.attempts.load(Ordering::SeqCst), 2);
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn silent_device_trips_watchdog() {
    let mut harness = start(0);
    let _silent = harness.peers.recv().await.expect("peer");
    let opened_at = Instant::now();

    let _second = harness.peers.recv().await.expect("second peer");
    let elapsed = opened_at.elapsed();

    // 180s 静默后的轮询 tick 终止连接，再经 5s 重连
    assert!(elapsed >= Duration::from_secs(185));
    assert!(elapsed < Duration::from_secs(190));
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn chatty_device_keeps_connection() {
    let mut harness = start(0);
    let mut peer = harness.peers.recv().await.expect("peer");

    for _ in 0..5 {
        let request = peer.next_request().await;
        peer.respond(&request, json!(1));
        tokio::time::sleep(Duration::from_secs(59)).await;
    }

    assert_eq!(harness.connector.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(harness.handle.state(), ConnectionState::Connected);
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn writes_while_disconnected_are_dropped() {
    let mut harness = start(1);
    settle().await;
    assert_eq!(harness.handle.state(), ConnectionState::Disconnected);

    harness
        .handle
        .write("/[0]/MNAE/1/Operation/Power", &StateValue::text("on"))
        .expect("queue write");

    let mut peer = harness.peers.recv().await.expect("peer");
    let first = peer.next_request().await;
    assert_eq!(first["m2m:rqp"]["op"], json!(2));

    harness
        .handle
        .write("/[0]/MNAE/1/Operation/Power", &StateValue::text("standby"))
        .expect("write");
    let mut saw_write = false;
    for _ in 0..17 {
        let frame = peer.next_request().await;
        if frame["m2m:rqp"]["op"] == json!(1) {
            assert_eq!(frame["m2m:rqp"]["pc"]["m2m:cin"]["con"], json!("standby"));
            assert!(
                frame["m2m:rqp"]["rqi"]
                    .as_str()
                    .expect("rqi")
                    .starts_with("set_")
            );
            saw_write = true;
            break;
        }
    }
    assert!(saw_write);
    harness.handle.shutdown().expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn forced_poll_while_disconnected_is_noop() {
    let mut harness = start(usize::MAX);
    settle().await;
    harness.handle.poll_now().expect("poll");
    settle().await;

    assert_eq!(harness.handle.state(), ConnectionState::Disconnected);
    assert!(harness.peers.try_recv().is_err());
    harness.handle.shutdown().expect("shutdown");
}

/// 建连永不完成的连接器。
#[derive(Default)]
struct StalledConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for StalledConnector {
    async fn connect(&self, _address: &str) -> Result<Transport, ProtocolError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_connect_times_out_and_retries() {
    let connector = Arc::new(StalledConnector::default());
    let (manager, handle) = ConnectionManager::new(
        ConnectionConfig::new("device.local"),
        connector.clone(),
        RecordingHandler::default(),
    );
    manager.spawn();

    settle().await;
    assert_eq!(handle.state(), ConnectionState::Connecting);

    // 5s 建连超时后转为断开，再等 5s 重连
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(handle.state(), ConnectionState::Connecting);
    handle.shutdown().expect("shutdown");
}

//! 热泵协议桥运行时：设备连接、状态分发、历史存储与 HTTP 查询面。

mod handlers;
mod middleware;
mod routes;
mod runtime;
mod utils;

use bridge_config::{AppConfig, SettingsStore};
use bridge_control::{CommandService, ConnectionDispatcher};
use bridge_fanout::{
    BusLink, BusSink, ControllerLink, ControllerSink, UiHub, UiStateObserver,
};
use bridge_normalize::PathMapper;
use bridge_pipeline::{StateReader, StateStore};
use bridge_protocol::{ConnectionConfig, ConnectionHandle, ConnectionManager, WsConnector};
use bridge_storage::{
    HistoryEngine, LogStore, ReadingStore, SqliteLogStore, SqliteReadingStore, connect_pool,
};
use bridge_telemetry::{init_tracing, log_capture};
use runtime::{DeviceFrameHandler, Downstream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub link: ConnectionHandle,
    pub state: StateReader,
    pub commands: CommandService,
    pub history: Arc<HistoryEngine>,
    pub logs: Arc<dyn LogStore>,
    pub settings: Arc<SettingsStore>,
    pub downstream: Downstream,
    pub ui: UiHub,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    // 结构化日志 + 日志捕获（持久化并推送到界面）
    let (capture, captured) = log_capture();
    init_tracing(Some(capture));

    let settings_store = Arc::new(SettingsStore::new(&config.settings_path));
    let settings = settings_store.load()?;

    let pool = connect_pool(&config.database_url).await?;
    let readings: Arc<dyn ReadingStore> = Arc::new(SqliteReadingStore::new(pool.clone()));
    let logs: Arc<dyn LogStore> = Arc::new(SqliteLogStore::new(pool));

    // 下游：控制器数据报、总线、界面
    let ui = UiHub::new();
    let controller = ControllerLink::bind().await?;
    let (bus_commands_tx, bus_commands_rx) = mpsc::unbounded_channel();
    let bus = BusLink::new(bus_commands_tx);

    let store = StateStore::new()
        .with_observer(Box::new(ControllerSink::new(controller.clone())))
        .with_observer(Box::new(BusSink::new(bus.clone())))
        .with_observer(Box::new(UiStateObserver::new(ui.clone())));
    let state = store.reader();

    // 设备连接（单任务持有状态存储）
    let mut connection = ConnectionConfig::new(settings.device_address.clone());
    connection.request_timeout = config.request_timeout;
    let (manager, link) = ConnectionManager::new(
        connection,
        Arc::new(WsConnector),
        DeviceFrameHandler::new(PathMapper::default(), store),
    );
    let connection_task = manager.spawn();

    let commands = CommandService::new(Arc::new(ConnectionDispatcher::new(link.clone())), state.clone());
    let downstream = Downstream::new(controller, bus.clone(), state.clone());
    downstream.apply_settings(&settings, &link).await;

    // 后台任务
    let mut tasks = vec![
        runtime::spawn_log_sink(captured, Arc::clone(&logs), ui.clone()),
        runtime::spawn_snapshots(state.clone(), Arc::clone(&readings), config.snapshot_interval),
        runtime::spawn_bus_commands(bus_commands_rx, commands.clone()),
        runtime::spawn_bus_status(bus.watch_status(), ui.clone()),
    ];
    tasks.extend(runtime::spawn_log_retention(
        Arc::clone(&logs),
        config.log_retention_days,
    ));

    let app_state = AppState {
        link: link.clone(),
        state,
        commands,
        history: Arc::new(HistoryEngine::new(readings)),
        logs,
        settings: settings_store,
        downstream: downstream.clone(),
        ui,
    };
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "bridge.api", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(target: "bridge.api", "shutting_down");
    downstream.shutdown().await;
    let _ = link.shutdown();
    let _ = connection_task.await;
    for task in tasks {
        task.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    // 监听失败时直接进入退出流程
    let _ = tokio::signal::ctrl_c().await;
}

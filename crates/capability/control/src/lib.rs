//! 命令链路：翻译 → 下发（发出即忘）→ 延迟补轮询。

mod translator;

pub use translator::{
    COOLING_FALLBACK_TARGET, COOLING_MAX_TARGET, Command, CommandTranslator, DeviceWrite,
    HEATING_FALLBACK_TARGET, HEATING_MIN_TARGET, HOT_WATER_POWER_PATH, HOT_WATER_POWERFUL_PATH,
    HOT_WATER_TARGET_PATH, OFFSET_HEATING_PATH, OPERATION_MODE_PATH, POWER_HEATING_PATH,
    TARGET_COOLING_PATH, TARGET_HEATING_PATH, normalize_command_argument,
};

use async_trait::async_trait;
use bridge_pipeline::StateReader;
use bridge_protocol::ConnectionHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 写入后补轮询的默认延迟。
pub const DEFAULT_FOLLOW_UP_DELAY: Duration = Duration::from_millis(1500);

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid argument for {command}: {argument:?}")]
    InvalidArgument { command: String, argument: String },
    #[error("target temperature not supported in mode {0}")]
    UnsupportedMode(String),
    #[error("dispatch error: {0}")]
    Dispatch(String),
}

impl ControlError {
    pub(crate) fn invalid_argument(command: Command, argument: &str) -> Self {
        ControlError::InvalidArgument {
            command: command.to_string(),
            argument: argument.to_string(),
        }
    }
}

/// 设备写入下发器抽象。
#[async_trait]
pub trait WriteDispatcher: Send + Sync {
    /// 下发写入，不等待设备确认。
    async fn dispatch(&self, write: &DeviceWrite) -> Result<(), ControlError>;

    /// 请求一次立即轮询，用于观察写入效果。
    async fn refresh(&self) -> Result<(), ControlError> {
        Ok(())
    }
}

/// 经由设备连接下发。
#[derive(Clone)]
pub struct ConnectionDispatcher {
    link: ConnectionHandle,
}

impl ConnectionDispatcher {
    pub fn new(link: ConnectionHandle) -> Self {
        Self { link }
    }
}

#[async_trait]
impl WriteDispatcher for ConnectionDispatcher {
    async fn dispatch(&self, write: &DeviceWrite) -> Result<(), ControlError> {
        self.link
            .write(&write.path, &write.value)
            .map_err(|err| ControlError::Dispatch(err.to_string()))
    }

    async fn refresh(&self) -> Result<(), ControlError> {
        self.link
            .poll_now()
            .map_err(|err| ControlError::Dispatch(err.to_string()))
    }
}

/// 命令服务（翻译 + 下发 + 补轮询）。
#[derive(Clone)]
pub struct CommandService {
    translator: CommandTranslator,
    dispatcher: Arc<dyn WriteDispatcher>,
    state: StateReader,
    follow_up_delay: Option<Duration>,
}

impl CommandService {
    pub fn new(dispatcher: Arc<dyn WriteDispatcher>, state: StateReader) -> Self {
        Self {
            translator: CommandTranslator::new(),
            dispatcher,
            state,
            follow_up_delay: Some(DEFAULT_FOLLOW_UP_DELAY),
        }
    }

    /// 调整（或关闭）写入后的补轮询。
    pub fn with_follow_up(mut self, delay: Option<Duration>) -> Self {
        self.follow_up_delay = delay;
        self
    }

    /// 执行命令。
    ///
    /// 翻译失败时写入不会发出；错误已记录日志，调用方可直接忽略。
    pub async fn execute(&self, name: &str, argument: &str) -> Result<DeviceWrite, ControlError> {
        let state = self.state.snapshot();
        let write = match self.translator.translate(name, argument, &state) {
            Ok(write) => write,
            Err(err) => {
                bridge_telemetry::record_command_rejected();
                warn!(
                    target: "bridge.control",
                    command = name,
                    argument,
                    error = %err,
                    "command_rejected"
                );
                return Err(err);
            }
        };

        if let Err(err) = self.dispatcher.dispatch(&write).await {
            bridge_telemetry::record_command_rejected();
            warn!(
                target: "bridge.control",
                command = %write.command,
                path = %write.path,
                error = %err,
                "command_dispatch_failed"
            );
            return Err(err);
        }

        bridge_telemetry::record_command_accepted();
        info!(
            target: "bridge.control",
            command = %write.command,
            path = %write.path,
            value = %write.value,
            "command_dispatched"
        );

        if let Some(delay) = self.follow_up_delay {
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = dispatcher.refresh().await {
                    warn!(target: "bridge.control", error = %err, "follow_up_poll_failed");
                }
            });
        }

        Ok(write)
    }

    /// 立即轮询。
    pub async fn refresh(&self) -> Result<(), ControlError> {
        self.dispatcher.refresh().await
    }
}

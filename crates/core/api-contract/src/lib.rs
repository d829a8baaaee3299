//! 查询面的 DTO 与统一响应契约。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 命令请求体（`POST /api/commands`）。
///
/// `value` 可以是字符串、数字或布尔，统一按文本交给翻译器。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(alias = "cmd")]
    pub name: String,
    #[serde(alias = "val", default)]
    pub value: Value,
}

impl CommandRequest {
    pub fn argument(&self) -> String {
        value_as_argument(&self.value)
    }
}

/// 旧式控制器输出的查询参数（`GET /set?cmd=&val=`）。
#[derive(Debug, Deserialize)]
pub struct SetQuery {
    pub cmd: Option<String>,
    pub val: Option<String>,
}

/// JSON 值 → 命令参数文本。
pub fn value_as_argument(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 已下发的命令。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResultDto {
    pub command: String,
    pub path: String,
    pub value: Value,
}

/// 历史查询参数（未知模式按 `24h`）。
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQueryParams {
    pub mode: Option<String>,
}

/// 日志查询参数：`date=YYYY-MM-DD` 或 `limit=N`。
#[derive(Debug, Default, Deserialize)]
pub struct LogsQueryParams {
    pub date: Option<String>,
    pub limit: Option<usize>,
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub connection: String,
    pub bus_connected: bool,
}

/// 已受理的异步操作（如强制轮询）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedDto {
    pub accepted: bool,
}

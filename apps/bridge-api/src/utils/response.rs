//! HTTP 响应辅助函数
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码对应。

use api_contract::{ApiResponse, CommandResultDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bridge_config::ConfigError;
use bridge_control::{ControlError, DeviceWrite};
use bridge_protocol::value_to_json;

/// 成功响应
pub fn ok<T: serde::Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 命令错误响应
pub fn command_error(err: ControlError) -> Response {
    let (status, code) = match &err {
        ControlError::UnknownCommand(_) => (StatusCode::BAD_REQUEST, "COMMAND.UNKNOWN"),
        ControlError::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "COMMAND.INVALID_ARGUMENT"),
        ControlError::UnsupportedMode(_) => (StatusCode::CONFLICT, "COMMAND.UNSUPPORTED_MODE"),
        ControlError::Dispatch(_) => (StatusCode::SERVICE_UNAVAILABLE, "COMMAND.DISPATCH_FAILED"),
    };
    (status, Json(ApiResponse::<()>::error(code, err.to_string()))).into_response()
}

/// 配置错误响应
pub fn config_error(err: ConfigError) -> Response {
    let status = match &err {
        ConfigError::Invalid(..) | ConfigError::Document(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiResponse::<()>::error("CONFIG.ERROR", err.to_string())),
    )
        .into_response()
}

/// DeviceWrite 转 CommandResultDto
pub fn write_to_dto(write: DeviceWrite) -> CommandResultDto {
    CommandResultDto {
        command: write.command.to_string(),
        path: write.path,
        value: value_to_json(&write.value),
    }
}

//! 控制命令 handlers
//!
//! - GET /set?cmd=&val=（旧式控制器输出，纯文本响应）
//! - POST /api/commands
//! - POST /refresh

use crate::AppState;
use crate::utils::response::{bad_request_error, command_error, ok, write_to_dto};
use api_contract::{AcceptedDto, CommandRequest, SetQuery};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bridge_control::normalize_command_argument;
use tracing::info;

pub async fn legacy_set(State(state): State<AppState>, Query(query): Query<SetQuery>) -> Response {
    let (Some(cmd), Some(val)) = (query.cmd, query.val) else {
        return (StatusCode::BAD_REQUEST, "Error").into_response();
    };
    let argument = normalize_command_argument(&cmd, &val);
    match state.commands.execute(&cmd, &argument).await {
        Ok(_) => (StatusCode::OK, format!("OK: {}={}", cmd, argument)).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, format!("Error: {}", err)).into_response(),
    }
}

pub async fn execute_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Response {
    let name = req.name.trim();
    if name.is_empty() {
        return bad_request_error("name is required");
    }
    let argument = normalize_command_argument(name, &req.argument());
    match state.commands.execute(name, &argument).await {
        Ok(write) => ok(write_to_dto(write)),
        Err(err) => command_error(err),
    }
}

pub async fn refresh(State(state): State<AppState>) -> Response {
    match state.commands.refresh().await {
        Ok(()) => {
            info!(target: "bridge.api", "manual_refresh");
            ok(AcceptedDto { accepted: true })
        }
        Err(err) => command_error(err),
    }
}

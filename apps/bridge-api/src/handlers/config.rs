//! 配置 handlers
//!
//! - GET /api/config
//! - POST /api/config（合并补丁并立即生效）

use crate::AppState;
use crate::utils::response::{config_error, ok};
use axum::{Json, extract::State, response::Response};
use serde_json::Value;

pub async fn get_config(State(state): State<AppState>) -> Response {
    match state.settings.load() {
        Ok(settings) => ok(settings),
        Err(err) => config_error(err),
    }
}

pub async fn update_config(State(state): State<AppState>, Json(patch): Json<Value>) -> Response {
    let merged = match state.settings.update(&patch) {
        Ok(merged) => merged,
        Err(err) => return config_error(err),
    };
    state
        .downstream
        .apply_settings(&merged, &state.link)
        .await;
    ok(merged)
}

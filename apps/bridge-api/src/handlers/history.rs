//! 历史查询 handlers
//!
//! - GET /api/history?mode=

use crate::AppState;
use crate::utils::response::ok;
use api_contract::HistoryQueryParams;
use axum::{
    extract::{Query, State},
    response::Response,
};
use bridge_storage::HistoryMode;

/// 未知或缺失的模式按 `24h` 查询；存储失败时返回空结果。
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQueryParams>,
) -> Response {
    let mode = HistoryMode::parse(query.mode.as_deref().unwrap_or_default());
    ok(state.history.query(mode).await)
}

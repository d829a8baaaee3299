//! 日志查询 handlers
//!
//! - GET /api/logs?date=YYYY-MM-DD
//! - GET /api/logs?limit=N

use crate::AppState;
use crate::utils::response::{bad_request_error, ok};
use api_contract::LogsQueryParams;
use axum::{
    extract::{Query, State},
    response::Response,
};
use bridge_storage::day_window;
use chrono::NaiveDate;
use domain::LogEntry;
use tracing::warn;

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;

pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQueryParams>,
) -> Response {
    let result = match query.date.as_deref().map(str::trim) {
        Some(date) if !date.is_empty() => {
            let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
                return bad_request_error("date must be YYYY-MM-DD");
            };
            let window = day_window(state.history.timezone(), date);
            state.logs.list_range(window.from, window.to).await
        }
        _ => {
            let limit = query
                .limit
                .unwrap_or(DEFAULT_LOG_LIMIT)
                .clamp(1, MAX_LOG_LIMIT);
            state.logs.latest(limit).await
        }
    };
    let entries: Vec<LogEntry> = result.unwrap_or_else(|err| {
        bridge_telemetry::record_storage_failure();
        warn!(target: "bridge.storage", error = %err, "log_query_failed");
        Vec::new()
    });
    ok(entries)
}

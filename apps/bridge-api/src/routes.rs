//! 路由定义
//!
//! - 健康检查：/health
//! - 状态与历史：/api/state, /api/history
//! - 命令：/set（旧式控制器输出）, /api/commands, /refresh
//! - 配置：/api/config
//! - 日志与指标：/api/logs, /api/metrics
//! - 实时推送：/ws

use super::AppState;
use super::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(get_state))
        .route("/api/history", get(get_history))
        .route("/set", get(legacy_set))
        .route("/api/commands", post(execute_command))
        .route("/refresh", post(refresh))
        .route("/api/config", get(get_config).post(update_config))
        .route("/api/logs", get(get_logs))
        .route("/api/metrics", get(get_metrics))
        .route("/ws", get(live_feed))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

//! 计数器快照
//!
//! - GET /api/metrics

use crate::utils::response::ok;
use axum::response::Response;
use bridge_telemetry::metrics;

pub async fn get_metrics() -> Response {
    ok(metrics().snapshot())
}

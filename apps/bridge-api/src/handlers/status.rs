//! 状态 handlers
//!
//! - GET /health
//! - GET /api/state

use crate::AppState;
use crate::utils::response::ok;
use api_contract::HealthDto;
use axum::{extract::State, response::Response};
use bridge_protocol::ConnectionState;

pub async fn health(State(state): State<AppState>) -> Response {
    let connection = match state.link.state() {
        ConnectionState::Connected => "connected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Disconnected => "disconnected",
    };
    ok(HealthDto {
        status: "ok".to_string(),
        connection: connection.to_string(),
        bus_connected: state.downstream.bus.is_connected(),
    })
}

pub async fn get_state(State(state): State<AppState>) -> Response {
    ok(state.state.snapshot())
}

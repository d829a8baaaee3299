//! 实时推送
//!
//! - GET /ws：新客户端先收到当前状态（非空时）与总线状态，之后接收广播事件。

use crate::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bridge_fanout::UiEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

pub async fn live_feed(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_client(socket, state))
}

async fn serve_client(mut socket: WebSocket, state: AppState) {
    // 先订阅，避免初始推送与广播之间丢事件
    let mut events = state.ui.subscribe();

    let mut initial = Vec::new();
    let snapshot = state.state.snapshot();
    if !snapshot.is_empty() {
        initial.push(UiEvent::State(snapshot));
    }
    initial.push(UiEvent::MqttStatus {
        connected: state.downstream.bus.is_connected(),
    });
    for event in initial {
        if !send_event(&mut socket, &event).await {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !send_event(&mut socket, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(target: "bridge.api", skipped, "live_client_lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(target: "bridge.api", "live_client_closed");
}

async fn send_event(socket: &mut WebSocket, event: &UiEvent) -> bool {
    let Ok(text) = event.to_json() else {
        return true;
    };
    socket.send(Message::Text(text)).await.is_ok()
}

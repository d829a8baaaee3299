//! WebSocket 传输（`ws://<设备地址>/mca`）。

use crate::connection::{Connector, Transport, TransportEvent};
use crate::error::ProtocolError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// 设备端点路径。
pub const DEVICE_ENDPOINT: &str = "/mca";

/// 设备地址 → WebSocket URL；已带 scheme 的地址原样使用。
pub fn device_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{}{}", address.trim_end_matches('/'), DEVICE_ENDPOINT)
    }
}

/// 基于 tokio-tungstenite 的连接器。
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, address: &str) -> Result<Transport, ProtocolError> {
        if address.trim().is_empty() {
            return Err(ProtocolError::Connection("device address not configured".to_string()));
        }
        let url = device_url(address);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ProtocolError::Connection(err.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let writer_events = inbound_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(err) = write.send(Message::Text(frame)).await {
                    let _ = writer_events.send(TransportEvent::Error(err.to_string()));
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => TransportEvent::Frame(text),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => {
                            debug!(target: "bridge.protocol", "binary_frame_skipped");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(err) => {
                        let _ = inbound_tx.send(TransportEvent::Error(err.to_string()));
                        return;
                    }
                };
                if inbound_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = inbound_tx.send(TransportEvent::Closed);
        });

        Ok(Transport::new(outbound_tx, inbound_rx, vec![writer, reader]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_url_appends_endpoint() {
        assert_eq!(device_url("192.168.1.36"), "ws://192.168.1.36/mca");
        assert_eq!(device_url(" 10.0.0.2:80 "), "ws://10.0.0.2:80/mca");
        assert_eq!(device_url("ws://host/custom"), "ws://host/custom");
    }
}

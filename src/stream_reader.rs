use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::ais::{self, AisRecord};
use crate::config::StreamConfig;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("subscription rejected: {0}")]
    Subscription(String),
    #[error("stream closed by server")]
    Closed,
}

/// AIS WebSocket reader.
///
/// Connects to the configured feed, subscribes to the canal bounding box and
/// forwards decoded records on an mpsc channel. On any transport failure it
/// logs, waits the configured delay, and reconnects; the tracking core never
/// sees the disconnect.
pub struct AisStreamReader {
    config: StreamConfig,
    api_key: String,
    tx: mpsc::Sender<AisRecord>,
}

impl AisStreamReader {
    pub fn new(config: StreamConfig, api_key: String, tx: mpsc::Sender<AisRecord>) -> Self {
        Self { config, api_key, tx }
    }

    fn subscription_message(&self) -> String {
        let b = &self.config.bounding_box;
        json!({
            "APIKey": self.api_key,
            "BoundingBoxes": [[[b[0][0], b[0][1]], [b[1][0], b[1][1]]]],
            "FilterMessageTypes": ["PositionReport", "ShipStaticData"],
        })
        .to_string()
    }

    /// Run the reader until the record channel closes.
    pub async fn run(self) {
        loop {
            match self.read_session().await {
                Ok(()) => {
                    // The receiving side hung up; we are shutting down.
                    info!("AIS record channel closed, stopping stream reader");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "AIS stream failed, reconnecting in {} s", self.config.reconnect_seconds);
                    tokio::time::sleep(self.config.reconnect_delay()).await;
                }
            }
        }
    }

    /// One connect-subscribe-read session. Returns Ok only when the consumer
    /// side of the channel is gone.
    async fn read_session(&self) -> Result<(), StreamError> {
        info!(url = %self.config.url, "connecting to AIS stream");
        let (ws, _) = connect_async(self.config.url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        sink.send(Message::text(self.subscription_message())).await?;
        info!("AIS subscription sent");

        while let Some(frame) = stream.next().await {
            match frame? {
                Message::Text(text) => {
                    if text.contains("error") && text.contains("APIKey") {
                        return Err(StreamError::Subscription(text.to_string()));
                    }
                    match ais::decode(&text) {
                        Some(record) => {
                            debug!(mmsi = record.mmsi(), "ais record decoded");
                            if self.tx.send(record).await.is_err() {
                                return Ok(());
                            }
                        }
                        None => {
                            debug!("dropping undecodable AIS frame");
                        }
                    }
                }
                Message::Ping(payload) => {
                    sink.send(Message::Pong(payload)).await?;
                }
                Message::Close(_) => {
                    return Err(StreamError::Closed);
                }
                _ => {}
            }
        }
        Err(StreamError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_message_shape() {
        let (tx, _rx) = mpsc::channel(8);
        let reader = AisStreamReader::new(StreamConfig::default(), "test-key".into(), tx);
        let msg = reader.subscription_message();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["APIKey"], "test-key");
        assert_eq!(parsed["FilterMessageTypes"][0], "PositionReport");
        assert_eq!(parsed["FilterMessageTypes"][1], "ShipStaticData");
        let bbox = &parsed["BoundingBoxes"][0];
        assert!(bbox[0][0].as_f64().unwrap() < bbox[1][0].as_f64().unwrap());
    }
}

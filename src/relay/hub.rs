//! Broadcast hub behind `GET /relay/ws`.

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::model::{REDDIT_ANALYSIS_TYPE, RedditAnalysis, RelayEnvelope};

/// Envelopes buffered per subscriber before it starts lagging.
pub const CHANNEL_CAPACITY: usize = 64;

/// Fan-out point for relay envelopes.
#[derive(Clone)]
pub struct RelayHub {
    sender: broadcast::Sender<String>,
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Broadcast one analysis. Returns the number of subscribers reached.
    pub fn publish(&self, analysis: &RedditAnalysis, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let envelope = RelayEnvelope::reddit_analysis(analysis, now);
        let text = serde_json::to_string(&envelope)?;
        Ok(self.send(text))
    }

    /// Rebroadcast an envelope received from a socket client.
    ///
    /// Only `reddit_analysis` envelopes are forwarded; a missing timestamp is
    /// filled in with `now`.
    pub fn rebroadcast(&self, text: &str, now: DateTime<Utc>) -> Option<usize> {
        let mut value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object_mut()?;
        if object.get("type").and_then(Value::as_str) != Some(REDDIT_ANALYSIS_TYPE) {
            return None;
        }
        object
            .entry("timestamp")
            .or_insert_with(|| Value::String(now.to_rfc3339()));

        Some(self.send(value.to_string()))
    }

    fn send(&self, text: String) -> usize {
        // No receivers is not an error for a broadcaster
        self.sender.send(text).unwrap_or(0)
    }

    /// Drive one subscriber connection until either side closes.
    pub async fn serve_socket(self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();
        let mut receiver = self.subscribe();
        info!(subscribers = self.subscriber_count(), "Relay subscriber connected");

        let mut forward = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Relay subscriber lagging; envelopes dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        loop {
            tokio::select! {
                _ = &mut forward => break,
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reached = self.rebroadcast(&text, Utc::now());
                        debug!(forwarded = reached.is_some(), "Relay envelope received");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "Relay socket error");
                        break;
                    }
                },
            }
        }

        forward.abort();
        info!("Relay subscriber disconnected");
    }
}

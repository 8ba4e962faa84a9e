//! Relay subscriber that feeds the overlay.
//!
//! The connection is held open for the life of the process. Whenever it closes
//! or fails to open, the client waits [`RECONNECT_DELAY`] and tries again; there
//! is no backoff and no retry limit.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::model::{RedditAnalysis, RelayEnvelope};
use crate::overlay::Overlay;

/// Delay between a closed connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Decode one socket frame. Anything but a well-formed `reddit_analysis`
/// envelope yields `None`.
pub fn decode_envelope(text: &str) -> Option<RedditAnalysis> {
    serde_json::from_str::<RelayEnvelope>(text)
        .ok()?
        .into_reddit_analysis()
}

pub struct RelayClient {
    url: String,
    reconnect_delay: Duration,
    overlay: Overlay,
}

impl RelayClient {
    pub fn new(url: &str, overlay: Overlay) -> Self {
        Self {
            url: url.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            overlay,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Push a received frame onto the overlay. Returns whether it was displayed.
    pub async fn handle_frame(&self, text: &str, now: DateTime<Utc>) -> bool {
        match decode_envelope(text) {
            Some(analysis) => {
                info!(
                    toxicity_level = %analysis.toxicity_level,
                    subreddit = analysis.subreddit.as_deref().unwrap_or(""),
                    "Relayed analysis received"
                );
                self.overlay.push_notification(analysis, now).await;
                true
            }
            None => {
                debug!(len = text.len(), "Ignoring relay frame");
                false
            }
        }
    }

    /// Connect and consume frames until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(url = %self.url, "Relay client starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match connect_async(self.url.as_str()).await {
                Ok((mut stream, _)) => {
                    info!(url = %self.url, "Relay connected");
                    loop {
                        tokio::select! {
                            frame = stream.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    self.handle_frame(&text, Utc::now()).await;
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    info!("Relay connection closed");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!(error = %e, "Relay connection error");
                                    break;
                                }
                            },
                            _ = shutdown.changed() => break,
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Relay connection failed");
                }
            }

            if *shutdown.borrow() {
                break;
            }

            debug!(delay_secs = self.reconnect_delay.as_secs(), "Relay reconnect scheduled");
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Relay client stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const FRAME: &str = r#"{"type":"reddit_analysis","timestamp":"2024-05-01T12:00:00","data":{"post_title":"WIBTA if I skipped the wedding","toxicity_level":"High","analysis_summary":"Several hostile replies","url":"https://reddit.com/r/x/1"}}"#;

    #[test]
    fn test_decode_envelope() {
        let analysis = decode_envelope(FRAME).unwrap();
        assert_eq!(analysis.toxicity_level, "High");
        assert_eq!(analysis.url.as_deref(), Some("https://reddit.com/r/x/1"));
        assert!(analysis.subreddit.is_none());
    }

    #[test]
    fn test_decode_rejects_other_frames() {
        assert!(decode_envelope("hello").is_none());
        assert!(decode_envelope(r#"{"type":"status","data":{}}"#).is_none());
        assert!(decode_envelope(r#"{"data":{"post_title":"t"}}"#).is_none());
    }

    #[tokio::test]
    async fn test_frames_become_independent_notifications() {
        let overlay = Overlay::new();
        let client = RelayClient::new("ws://127.0.0.1:1/relay/ws", overlay.clone());
        let now = Utc::now();

        assert!(client.handle_frame(FRAME, now).await);
        assert!(client.handle_frame(FRAME, now + ChronoDuration::seconds(10)).await);
        assert!(!client.handle_frame("{}", now).await);

        let snapshot = overlay.snapshot(now + ChronoDuration::seconds(35)).await;
        assert_eq!(snapshot.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_while_unreachable() {
        let (tx, rx) = watch::channel(false);
        let client = RelayClient::new("ws://127.0.0.1:1/relay/ws", Overlay::new())
            .with_reconnect_delay(Duration::from_millis(20));

        let handle = tokio::spawn(client.run(rx));
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("client should stop")
            .unwrap();
    }
}

//! The page's render surface.
//!
//! Two independent pipelines write here and share nothing else:
//!
//! - the analysis session, which shows one card at a time (a rendered model,
//!   a transient error, or the generic failure card)
//! - the socket relay, which appends Reddit analysis notifications that
//!   dismiss themselves after a fixed duration
//!
//! Readers take a [`OverlaySnapshot`] at a given instant; expired entries are
//! dropped at that point.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::model::RedditAnalysis;
use crate::render::RenderModel;

/// How long a transient analysis error stays visible.
pub const ERROR_DISPLAY_SECONDS: i64 = 5;

/// How long a relayed notification stays visible.
pub const NOTIFICATION_DISPLAY_SECONDS: i64 = 30;

/// Message of the generic failure card.
pub const FAILED_TO_ANALYZE: &str = "Failed to analyze conversation";

/// The analysis card currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "card", rename_all = "snake_case")]
pub enum AnalysisCard {
    Rendered {
        model: RenderModel,
        rendered_at: DateTime<Utc>,
    },
    Error {
        message: String,
        expires_at: DateTime<Utc>,
    },
    Failed {
        message: String,
    },
}

/// A relayed Reddit analysis on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub analysis: RedditAnalysis,
    pub received_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Point-in-time view of the overlay.
#[derive(Debug, Clone, Serialize)]
pub struct OverlaySnapshot {
    pub timestamp: DateTime<Utc>,
    pub analysis: Option<AnalysisCard>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
struct OverlayState {
    analysis: Option<AnalysisCard>,
    notifications: Vec<Notification>,
}

impl OverlayState {
    fn prune(&mut self, now: DateTime<Utc>) {
        if let Some(AnalysisCard::Error { expires_at, .. }) = &self.analysis {
            if *expires_at <= now {
                self.analysis = None;
            }
        }
        self.notifications.retain(|n| n.expires_at > now);
    }
}

/// Shared handle to the render surface.
#[derive(Clone, Default)]
pub struct Overlay {
    state: Arc<RwLock<OverlayState>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a rendered analysis.
    pub async fn show_analysis(&self, model: RenderModel, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.analysis = Some(AnalysisCard::Rendered {
            model,
            rendered_at: now,
        });
    }

    /// Show a transient, self-dismissing error.
    pub async fn show_error(&self, message: &str, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.analysis = Some(AnalysisCard::Error {
            message: message.to_string(),
            expires_at: now + Duration::seconds(ERROR_DISPLAY_SECONDS),
        });
    }

    /// Show the generic failure card.
    pub async fn show_failure(&self) {
        let mut state = self.state.write().await;
        state.analysis = Some(AnalysisCard::Failed {
            message: FAILED_TO_ANALYZE.to_string(),
        });
    }

    /// Remove the analysis card (session stopped).
    pub async fn clear_analysis(&self) {
        self.state.write().await.analysis = None;
    }

    /// Display a relayed Reddit analysis.
    pub async fn push_notification(&self, analysis: RedditAnalysis, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.prune(now);
        state.notifications.push(Notification {
            analysis,
            received_at: now,
            expires_at: now + Duration::seconds(NOTIFICATION_DISPLAY_SECONDS),
        });
    }

    /// Snapshot of what is visible at `now`.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> OverlaySnapshot {
        let mut state = self.state.write().await;
        state.prune(now);
        OverlaySnapshot {
            timestamp: now,
            analysis: state.analysis.clone(),
            notifications: state.notifications.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnalysisResult;

    fn reddit(title: &str) -> RedditAnalysis {
        RedditAnalysis {
            post_title: title.to_string(),
            toxicity_level: "Medium".to_string(),
            analysis_summary: "summary".to_string(),
            url: None,
            subreddit: Some("relationships".to_string()),
        }
    }

    #[tokio::test]
    async fn test_error_card_expires() {
        let overlay = Overlay::new();
        let now = Utc::now();

        overlay.show_error("API error: quota", now).await;

        let visible = overlay.snapshot(now + Duration::seconds(1)).await;
        assert!(matches!(visible.analysis, Some(AnalysisCard::Error { .. })));

        let gone = overlay
            .snapshot(now + Duration::seconds(ERROR_DISPLAY_SECONDS))
            .await;
        assert!(gone.analysis.is_none());
    }

    #[tokio::test]
    async fn test_rendered_card_persists() {
        let overlay = Overlay::new();
        let now = Utc::now();
        let model = RenderModel::select(&AnalysisResult::default(), 0);

        overlay.show_analysis(model.clone(), now).await;

        let later = overlay.snapshot(now + Duration::hours(1)).await;
        assert_eq!(
            later.analysis,
            Some(AnalysisCard::Rendered {
                model,
                rendered_at: now
            })
        );
    }

    #[tokio::test]
    async fn test_notifications_dismiss_independently() {
        let overlay = Overlay::new();
        let now = Utc::now();

        overlay.push_notification(reddit("first"), now).await;
        overlay
            .push_notification(reddit("second"), now + Duration::seconds(20))
            .await;

        let mid = overlay.snapshot(now + Duration::seconds(29)).await;
        assert_eq!(mid.notifications.len(), 2);

        let later = overlay.snapshot(now + Duration::seconds(31)).await;
        assert_eq!(later.notifications.len(), 1);
        assert_eq!(later.notifications[0].analysis.post_title, "second");
    }

    #[tokio::test]
    async fn test_failure_card() {
        let overlay = Overlay::new();
        overlay.show_failure().await;
        let snapshot = overlay.snapshot(Utc::now()).await;
        assert_eq!(
            snapshot.analysis,
            Some(AnalysisCard::Failed {
                message: FAILED_TO_ANALYZE.to_string()
            })
        );
    }
}

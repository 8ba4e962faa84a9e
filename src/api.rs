//! HTTP API handlers for Toxiscope.
//!
//! # Privacy
//!
//! Chat messages and API keys pass through these handlers but are never logged.
//! Traces carry only counts, statuses, and classifier verdicts.

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::model::{
    AnalysisRecord, ControlAck, ControlMessage, ControlStatus, HistoryQuery, IngestResponse,
    MutationBatch, RedditAnalysis, Settings, SettingsView,
};
use crate::overlay::OverlaySnapshot;
use crate::relay::RelayHub;
use crate::session::AnalysisSession;
use crate::storage::Storage;

/// Upper bound on `GET /history?limit=`.
pub const MAX_HISTORY_LIMIT: u32 = 500;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: AnalysisSession,
    pub storage: Storage,
    pub hub: RelayHub,
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/control", post(post_control))
        .route("/mutations", post(post_mutations))
        .route("/overlay", get(get_overlay))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/history", get(get_history))
        .route("/relay/ws", get(relay_socket))
        .route("/relay/analysis", post(post_relay_analysis))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /control - Start or stop the analysis session.
///
/// # Request Body
///
/// ```json
/// { "action": "startAnalysis", "settings": { "apiKey": "...", "messageCount": 10 } }
/// { "action": "stopAnalysis" }
/// ```
///
/// Without `settings`, a start uses the persisted settings.
///
/// # Response
///
/// `{"status": "started" | "stopped"}`, or `{"status": "error", "message": "..."}`
/// with `400 Bad Request` when the settings cannot drive a session.
#[instrument(skip(state, message))]
pub async fn post_control(
    State(state): State<AppState>,
    Json(message): Json<ControlMessage>,
) -> (StatusCode, Json<ControlAck>) {
    match message {
        ControlMessage::StartAnalysis { settings } => {
            let settings = match settings {
                Some(settings) => settings,
                None => match state.storage.load_settings().await {
                    Ok(settings) => settings,
                    Err(e) => {
                        warn!(error = %e, "Failed to load persisted settings");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(ControlAck::error("Failed to load settings")),
                        );
                    }
                },
            };

            match state.session.start(settings).await {
                Ok(epoch) => {
                    info!(epoch, "Control: analysis started");
                    (StatusCode::OK, Json(ControlAck::ok(ControlStatus::Started)))
                }
                Err(e) => {
                    warn!(error = %e, "Control: start rejected");
                    (StatusCode::BAD_REQUEST, Json(ControlAck::error(e.to_string())))
                }
            }
        }
        ControlMessage::StopAnalysis => {
            state.session.stop().await;
            info!("Control: analysis stopped");
            (StatusCode::OK, Json(ControlAck::ok(ControlStatus::Stopped)))
        }
    }
}

/// POST /mutations - Feed one batch of DOM changes into the session.
///
/// Returns `409 Conflict` when no session is active.
#[instrument(skip(state, batch), fields(mutations = batch.mutations.len()))]
pub async fn post_mutations(
    State(state): State<AppState>,
    Json(batch): Json<MutationBatch>,
) -> Result<Json<IngestResponse>, StatusCode> {
    let outcome = state
        .session
        .ingest(&batch, Utc::now())
        .await
        .ok_or(StatusCode::CONFLICT)?;

    Ok(Json(IngestResponse {
        accepted: outcome.accepted,
        buffered: outcome.buffered,
        analysis_triggered: outcome.cycle.is_some(),
    }))
}

/// GET /overlay - What the page overlay shows right now.
pub async fn get_overlay(State(state): State<AppState>) -> Json<OverlaySnapshot> {
    Json(state.session.overlay().snapshot(Utc::now()).await)
}

/// GET /settings - Persisted settings.
///
/// The API key is never returned; `apiKeySet` reports whether one is stored.
#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsView>, StatusCode> {
    match state.storage.load_settings().await {
        Ok(settings) => Ok(Json(SettingsView::from(&settings))),
        Err(e) => {
            warn!(error = %e, "Failed to load settings");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// PUT /settings - Replace the persisted settings.
///
/// A blank or missing `apiKey` keeps the stored key. Takes effect on the next
/// `startAnalysis`; a running session keeps its snapshot.
#[instrument(skip(state, settings))]
pub async fn put_settings(
    State(state): State<AppState>,
    Json(mut settings): Json<Settings>,
) -> StatusCode {
    if settings.api_key.trim().is_empty() {
        match state.storage.load_settings().await {
            Ok(stored) => settings.api_key = stored.api_key,
            Err(e) => {
                warn!(error = %e, "Failed to load settings");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
    }

    match state.storage.save_settings(&settings).await {
        Ok(()) => {
            info!(
                message_count = settings.message_count,
                analysis_delay_seconds = settings.analysis_delay_seconds,
                "Settings saved"
            );
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            warn!(error = %e, "Failed to save settings");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /history - Most recent accepted analyses, newest first.
///
/// # Query Parameters
///
/// - `limit` (optional): Maximum records (default: 20, capped at 500)
#[instrument(skip(state))]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<AnalysisRecord>>, StatusCode> {
    let limit = query.limit.min(MAX_HISTORY_LIMIT);

    match state.storage.recent_analyses(limit).await {
        Ok(records) => {
            info!(count = records.len(), limit, "History queried");
            Ok(Json(records))
        }
        Err(e) => {
            warn!(error = %e, "Failed to load history");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /relay/ws - Subscribe to relayed Reddit analyses.
pub async fn relay_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| state.hub.serve_socket(socket))
}

/// Response for POST /relay/analysis.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// Subscribers the envelope was handed to.
    pub delivered: usize,
}

/// POST /relay/analysis - Broadcast one Reddit analysis to every relay subscriber.
#[instrument(skip(state, analysis))]
pub async fn post_relay_analysis(
    State(state): State<AppState>,
    Json(analysis): Json<RedditAnalysis>,
) -> Result<(StatusCode, Json<PublishResponse>), StatusCode> {
    match state.hub.publish(&analysis, Utc::now()) {
        Ok(delivered) => {
            info!(
                delivered,
                toxicity_level = %analysis.toxicity_level,
                "Reddit analysis published"
            );
            Ok((StatusCode::ACCEPTED, Json(PublishResponse { delivered })))
        }
        Err(e) => {
            warn!(error = %e, "Failed to publish Reddit analysis");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

//! The analysis session: extractor, buffer, scheduler, classifier, parser and
//! render selection wired into one explicit lifecycle.
//!
//! # Lifecycle
//!
//! - [`AnalysisSession::start`] validates a settings snapshot, clears all
//!   per-session state and arms the scheduler under a fresh epoch.
//! - [`AnalysisSession::ingest`] handles one DOM change batch. When the
//!   scheduler fires, the remote call runs on its own task; the session lock
//!   is not held across it, so later batches keep filling the buffer.
//! - [`AnalysisSession::stop`] clears the buffer and streak and disarms the
//!   scheduler. A call still in flight completes into nothing.
//!
//! Session state and the overlay are always locked in that order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buffer::ConversationBuffer;
use crate::classifier::{ClassificationRequest, Classifier};
use crate::error::{ClassifierError, SettingsError};
use crate::extractor::extract_messages;
use crate::model::{AnalysisRecord, AnalysisResult, Message, MutationBatch, Settings};
use crate::overlay::Overlay;
use crate::parser::parse_analysis;
use crate::render::{HealthStreak, RenderModel};
use crate::scheduler::{AnalysisScheduler, Completion, CycleTicket};
use crate::storage::Storage;

/// Result of ingesting one batch.
#[derive(Debug)]
pub struct IngestOutcome {
    /// New messages appended to the buffer.
    pub accepted: usize,

    /// Buffer length after truncation.
    pub buffered: usize,

    /// The analysis cycle started by this batch, if any.
    pub cycle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SessionState {
    settings: Option<Settings>,
    buffer: ConversationBuffer,
    scheduler: AnalysisScheduler,
    streak: HealthStreak,
}

struct SessionInner {
    state: Mutex<SessionState>,
    classifier: Arc<dyn Classifier>,
    overlay: Overlay,
    storage: Option<Storage>,
}

/// Shared handle to the analysis session.
#[derive(Clone)]
pub struct AnalysisSession {
    inner: Arc<SessionInner>,
}

impl AnalysisSession {
    /// Create an idle session.
    ///
    /// Accepted results are appended to `storage` when one is given.
    pub fn new(classifier: Arc<dyn Classifier>, overlay: Overlay, storage: Option<Storage>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::default()),
                classifier,
                overlay,
                storage,
            }),
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.inner.overlay
    }

    /// Begin a session with `settings`. Restarts a session that is already running.
    ///
    /// Returns the new session epoch.
    pub async fn start(&self, settings: Settings) -> Result<u64, SettingsError> {
        settings.validate()?;

        let mut state = self.inner.state.lock().await;
        state.buffer.clear();
        state.streak.reset();
        let epoch = state.scheduler.start(settings.analysis_delay_seconds);
        info!(
            epoch,
            message_count = settings.message_count,
            analysis_delay_seconds = settings.analysis_delay_seconds,
            sensitivity = ?settings.sensitivity,
            "Analysis session started"
        );
        state.settings = Some(settings);
        self.inner.overlay.clear_analysis().await;

        Ok(epoch)
    }

    /// End the session. Safe to call when no session is running.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        let was_active = state.scheduler.is_active();
        state.buffer.clear();
        state.streak.reset();
        state.scheduler.stop();
        state.settings = None;
        self.inner.overlay.clear_analysis().await;

        if was_active {
            info!(epoch = state.scheduler.epoch(), "Analysis session stopped");
        }
    }

    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.scheduler.is_active()
    }

    /// Current buffer contents, oldest first.
    pub async fn buffered_messages(&self) -> Vec<Message> {
        self.inner.state.lock().await.buffer.snapshot()
    }

    /// Consecutive clean analyses in the current session.
    pub async fn healthy_streak(&self) -> u32 {
        self.inner.state.lock().await.streak.count()
    }

    /// Handle one DOM change batch observed at `now`.
    ///
    /// Returns `None` when no session is active.
    pub async fn ingest(&self, batch: &MutationBatch, now: DateTime<Utc>) -> Option<IngestOutcome> {
        let candidates = extract_messages(&batch.mutations, &batch.page_url);

        let mut state = self.inner.state.lock().await;
        let settings = state.settings.clone()?;

        let accepted = candidates
            .iter()
            .filter(|msg| state.buffer.append(msg))
            .count();
        state.buffer.truncate(settings.message_count);
        let buffered = state.buffer.len();

        let ticket = if accepted > 0 {
            state.scheduler.evaluate(buffered, now)
        } else {
            None
        };

        let cycle = ticket.map(|ticket| {
            let request = ClassificationRequest {
                api_key: settings.api_key.clone(),
                messages: state.buffer.snapshot(),
                sensitivity: settings.sensitivity,
            };
            info!(
                epoch = ticket.epoch,
                message_count = request.messages.len(),
                "Analysis triggered"
            );
            tokio::spawn(run_cycle(self.inner.clone(), ticket, request))
        });

        debug!(
            candidates = candidates.len(),
            accepted,
            buffered,
            triggered = cycle.is_some(),
            "Batch ingested"
        );

        Some(IngestOutcome {
            accepted,
            buffered,
            cycle,
        })
    }
}

/// Run one analysis cycle to completion and apply its result.
async fn run_cycle(inner: Arc<SessionInner>, ticket: CycleTicket, request: ClassificationRequest) {
    let message_count = request.messages.len();
    let classifier = inner.classifier.clone();

    // Classification and parsing run in their own task so a panic there is
    // contained and still releases the in-flight gate.
    let outcome: Result<Result<AnalysisResult, ClassifierError>, _> = tokio::spawn(async move {
        let raw = classifier.classify(&request).await?;
        Ok(parse_analysis(&raw))
    })
    .await;

    let mut state = inner.state.lock().await;
    if state.scheduler.complete(ticket) == Completion::Stale {
        debug!(epoch = ticket.epoch, "Discarding result of a stopped session");
        return;
    }

    let now = Utc::now();
    match outcome {
        Ok(Ok(result)) => {
            let streak = state.streak.record(&result);
            let model = RenderModel::select(&result, streak);
            info!(
                epoch = ticket.epoch,
                level = result.level.label(),
                toxic_person = result.toxic_person.label(),
                streak,
                healthy = model.is_healthy(),
                "Analysis completed"
            );

            // History lands before the card so readers of the overlay also see it
            if let Some(storage) = &inner.storage {
                let record = AnalysisRecord {
                    timestamp: now,
                    message_count,
                    result,
                };
                if let Err(e) = storage.record_analysis(&record).await {
                    warn!(error = %e, "Failed to record analysis history");
                }
            }
            inner.overlay.show_analysis(model, now).await;
        }
        Ok(Err(e)) => {
            warn!(epoch = ticket.epoch, error = %e, "Remote classification failed");
            inner
                .overlay
                .show_error(&format!("Analysis failed: {}", e), now)
                .await;
        }
        Err(e) => {
            error!(epoch = ticket.epoch, error = %e, "Analysis task aborted");
            inner.overlay.show_failure().await;
        }
    }
}

//! Render model selection for the overlay.
//!
//! Visual layout lives in the page; this module only decides *what* to show:
//! either the detailed per-field card or, after a run of clean analyses, the
//! positive "healthy conversation" card.

use serde::{Deserialize, Serialize};

use crate::model::{AnalysisResult, ToxicPerson, ToxicityLevel};

/// Clean results in a row needed before the healthy card replaces the detail card.
pub const HEALTHY_STREAK_THRESHOLD: u32 = 2;

/// Rolling count of consecutive clean analyses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthStreak {
    consecutive_empty: u32,
}

impl HealthStreak {
    /// Fold one parsed result into the streak and return the new count.
    pub fn record(&mut self, result: &AnalysisResult) -> u32 {
        if result.is_clean() {
            self.consecutive_empty = self.consecutive_empty.saturating_add(1);
        } else {
            self.consecutive_empty = 0;
        }
        self.consecutive_empty
    }

    pub fn reset(&mut self) {
        self.consecutive_empty = 0;
    }

    pub fn count(&self) -> u32 {
        self.consecutive_empty
    }
}

/// Per-participant status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonStatus {
    Toxic,
    Moderate,
    Good,
    Neutral,
}

/// Conversation participant as labeled in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    A,
    B,
}

/// Derive a participant's badge from the responsible-person field.
pub fn person_status(toxic_person: ToxicPerson, participant: Participant) -> PersonStatus {
    match (toxic_person, participant) {
        (ToxicPerson::PersonA, Participant::A) | (ToxicPerson::PersonB, Participant::B) => {
            PersonStatus::Toxic
        }
        (ToxicPerson::Both, _) => PersonStatus::Moderate,
        (ToxicPerson::None, _) => PersonStatus::Good,
        _ => PersonStatus::Neutral,
    }
}

/// Detailed analysis card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailView {
    pub level: ToxicityLevel,
    pub level_label: String,
    pub toxic_person: ToxicPerson,
    pub person_a: PersonStatus,
    pub person_b: PersonStatus,
    pub behaviors: Vec<String>,
    pub problem: String,
    pub suggestion: String,
}

/// What the overlay shows for one analysis cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum RenderModel {
    /// Positive card shown after a run of clean analyses.
    Healthy { streak: u32, message: String },
    /// Normal per-field card.
    Detail(DetailView),
}

impl RenderModel {
    /// Select the card for `result` given the streak *after* recording it.
    pub fn select(result: &AnalysisResult, streak: u32) -> Self {
        if streak >= HEALTHY_STREAK_THRESHOLD && result.level == ToxicityLevel::None {
            return RenderModel::Healthy {
                streak,
                message: "Healthy conversation! Both people are communicating respectfully."
                    .to_string(),
            };
        }

        RenderModel::Detail(DetailView {
            level: result.level,
            level_label: result.level.label().to_string(),
            toxic_person: result.toxic_person,
            person_a: person_status(result.toxic_person, Participant::A),
            person_b: person_status(result.toxic_person, Participant::B),
            behaviors: result.behaviors.clone(),
            problem: result.problem.clone(),
            suggestion: result.suggestion.clone(),
        })
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, RenderModel::Healthy { .. })
    }
}

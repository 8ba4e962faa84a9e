//! Data models for Toxiscope.
//!
//! # Privacy
//!
//! Chat text only lives in the in-memory conversation buffer and in the prompt
//! sent to the classifier. Nothing in this module is logged verbatim; handlers
//! log counts and lengths, never message bodies or API keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::extractor::AddedNode;

/// A single extracted chat message.
///
/// Messages carry no identity beyond their content. Two messages are the
/// same message if and only if their text is identical.
pub type Message = String;

/// How eagerly the classifier should flag borderline language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Calibration sentence embedded in the classifier prompt.
    pub fn prompt_hint(&self) -> &'static str {
        match self {
            Sensitivity::Low => {
                "Only flag clearly hostile or abusive language; ignore mild teasing and banter."
            }
            Sensitivity::Medium => {
                "Flag language that is disrespectful or hurtful, but allow ordinary disagreement."
            }
            Sensitivity::High => {
                "Flag even subtle signs of disrespect, dismissiveness, or passive aggression."
            }
        }
    }
}

/// Configuration snapshot for one analysis session.
///
/// Supplied atomically on `startAnalysis` and immutable for the session's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// API key for the remote classifier.
    #[serde(default)]
    pub api_key: String,

    /// Minimum seconds between analysis triggers (default: 10).
    #[serde(default = "default_analysis_delay", alias = "analysisDelay")]
    pub analysis_delay_seconds: u64,

    /// Capacity of the conversation buffer (default: 10).
    #[serde(default = "default_message_count")]
    pub message_count: usize,

    /// Classifier sensitivity (default: medium).
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

fn default_analysis_delay() -> u64 {
    10
}

fn default_message_count() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            analysis_delay_seconds: default_analysis_delay(),
            message_count: default_message_count(),
            sensitivity: Sensitivity::default(),
        }
    }
}

impl Settings {
    /// Check that this snapshot can drive a session.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_key.trim().is_empty() {
            return Err(SettingsError::MissingApiKey);
        }
        if self.message_count == 0 {
            return Err(SettingsError::InvalidMessageCount);
        }
        Ok(())
    }
}

/// Settings as returned by GET /settings. The API key is reduced to a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub api_key_set: bool,
    pub analysis_delay_seconds: u64,
    pub message_count: usize,
    pub sensitivity: Sensitivity,
}

impl From<&Settings> for SettingsView {
    fn from(settings: &Settings) -> Self {
        Self {
            api_key_set: !settings.api_key.trim().is_empty(),
            analysis_delay_seconds: settings.analysis_delay_seconds,
            message_count: settings.message_count,
            sensitivity: settings.sensitivity,
        }
    }
}

/// Overall toxicity level reported by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToxicityLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl ToxicityLevel {
    /// Parse the exact label used in the model output format.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "None" => Some(ToxicityLevel::None),
            "Low" => Some(ToxicityLevel::Low),
            "Medium" => Some(ToxicityLevel::Medium),
            "High" => Some(ToxicityLevel::High),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToxicityLevel::None => "None",
            ToxicityLevel::Low => "Low",
            ToxicityLevel::Medium => "Medium",
            ToxicityLevel::High => "High",
        }
    }
}

/// Which participant the classifier holds responsible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToxicPerson {
    PersonA,
    PersonB,
    Both,
    #[default]
    None,
}

impl ToxicPerson {
    /// Parse the exact label used in the model output format.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Person A" => Some(ToxicPerson::PersonA),
            "Person B" => Some(ToxicPerson::PersonB),
            "Both" => Some(ToxicPerson::Both),
            "None" => Some(ToxicPerson::None),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToxicPerson::PersonA => "Person A",
            ToxicPerson::PersonB => "Person B",
            ToxicPerson::Both => "Both",
            ToxicPerson::None => "None",
        }
    }
}

/// Default behaviors entry when nothing toxic was reported.
pub const NO_BEHAVIORS: &str = "No toxic behaviors detected";

/// Default problem statement.
pub const NO_PROBLEM: &str = "No significant issues";

/// Default suggestion.
pub const DEFAULT_SUGGESTION: &str = "Keep up the good communication";

/// Structured classification of one analysis cycle.
///
/// Every field is always populated; defaults stand in for anything the
/// model output did not provide in a usable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub level: ToxicityLevel,
    pub toxic_person: ToxicPerson,
    pub behaviors: Vec<String>,
    pub problem: String,
    pub suggestion: String,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            level: ToxicityLevel::None,
            toxic_person: ToxicPerson::None,
            behaviors: vec![NO_BEHAVIORS.to_string()],
            problem: NO_PROBLEM.to_string(),
            suggestion: DEFAULT_SUGGESTION.to_string(),
        }
    }
}

impl AnalysisResult {
    /// True when neither a level nor a responsible person was reported.
    pub fn is_clean(&self) -> bool {
        self.level == ToxicityLevel::None && self.toxic_person == ToxicPerson::None
    }
}

/// An accepted analysis result with the time it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: DateTime<Utc>,

    /// Number of buffered messages that were sent for analysis.
    pub message_count: usize,

    #[serde(flatten)]
    pub result: AnalysisResult,
}

/// Inbound control message from the external controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum ControlMessage {
    /// Begin an observation session. Falls back to persisted settings when omitted.
    #[serde(rename = "startAnalysis")]
    StartAnalysis {
        #[serde(default)]
        settings: Option<Settings>,
    },

    /// End the current session.
    #[serde(rename = "stopAnalysis")]
    StopAnalysis,
}

/// Status token acknowledging a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStatus {
    Started,
    Stopped,
    Error,
}

/// Acknowledgement returned for every control message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAck {
    pub status: ControlStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ControlAck {
    pub fn ok(status: ControlStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ControlStatus::Error,
            message: Some(message.into()),
        }
    }
}

/// One DOM mutation record as reported by the page observer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(default)]
    pub added_nodes: Vec<AddedNode>,
}

/// Request body for POST /mutations.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationBatch {
    /// URL of the observed page; selects the extraction platform.
    pub page_url: String,

    #[serde(default)]
    pub mutations: Vec<MutationRecord>,
}

/// Response for POST /mutations.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    /// New messages appended to the buffer by this batch.
    pub accepted: usize,

    /// Buffer length after truncation.
    pub buffered: usize,

    /// Whether this batch started an analysis cycle.
    pub analysis_triggered: bool,
}

/// Query parameters for GET /history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of records (default: 20).
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

fn default_history_limit() -> u32 {
    20
}

/// An externally computed Reddit analysis relayed over the socket channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedditAnalysis {
    pub post_title: String,
    pub toxicity_level: String,
    pub analysis_summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
}

/// Envelope type acted upon by relay clients.
pub const REDDIT_ANALYSIS_TYPE: &str = "reddit_analysis";

/// Wire envelope of the socket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "type")]
    pub kind: String,

    /// ISO-8601 send time. Producers do not agree on a timezone suffix, so
    /// this is carried as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl RelayEnvelope {
    /// Wrap a Reddit analysis for broadcast.
    pub fn reddit_analysis(analysis: &RedditAnalysis, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: REDDIT_ANALYSIS_TYPE.to_string(),
            timestamp: Some(timestamp.to_rfc3339()),
            data: serde_json::to_value(analysis).unwrap_or_default(),
        }
    }

    /// Extract the Reddit analysis if this envelope carries one.
    pub fn into_reddit_analysis(self) -> Option<RedditAnalysis> {
        if self.kind != REDDIT_ANALYSIS_TYPE {
            return None;
        }
        serde_json::from_value(self.data).ok()
    }
}

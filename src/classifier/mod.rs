//! Remote toxicity classification.
//!
//! The classifier turns the buffered messages into a two-party transcript,
//! wraps it in a fixed instruction prompt, and asks a remote language model
//! for the five-line analysis that [`crate::parser`] understands.
//!
//! # Speaker attribution
//!
//! Messages are labeled "Person A" and "Person B" by buffer position parity.
//! The extractor has no author information, so this is an approximation: two
//! consecutive messages from the same sender are attributed to different people,
//! and group chats collapse onto two labels.

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::ClassifierError;
use crate::model::{Message, Sensitivity};

/// One classification request.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub api_key: String,
    pub messages: Vec<Message>,
    pub sensitivity: Sensitivity,
}

/// A remote text-generation backend that classifies a conversation.
///
/// Implementations return the raw generated text; parsing happens elsewhere.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ClassifierError>;
}

/// Speaker label for the message at `index`.
pub fn speaker_label(index: usize) -> &'static str {
    if index % 2 == 0 { "Person A" } else { "Person B" }
}

/// Render messages as `Person A: ...` / `Person B: ...` lines.
pub fn build_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}: {}", speaker_label(i), msg))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full instruction prompt for a conversation.
pub fn build_prompt(messages: &[Message], sensitivity: Sensitivity) -> String {
    format!(
        "You are a neutral communication coach. Analyze the following conversation between two people for toxic behavior.\n\
         Be constructive and fair. Do not take sides without evidence from the messages.\n\
         {hint}\n\
         \n\
         CONVERSATION:\n\
         {transcript}\n\
         \n\
         Respond in exactly this format, one item per line, with no extra commentary:\n\
         Level: [None|Low|Medium|High]\n\
         ToxicPerson: [Person A|Person B|Both|None]\n\
         Behaviors: [comma-separated list of toxic behaviors, or \"No toxic behaviors detected\"]\n\
         Problem: [one sentence describing the main issue, or \"No significant issues\"]\n\
         Suggestion: [one constructive suggestion, or \"Keep up the good communication\"]",
        hint = sensitivity.prompt_hint(),
        transcript = build_transcript(messages),
    )
}

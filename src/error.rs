//! Error taxonomy for the analysis pipeline.
//!
//! None of these errors is fatal to the host process:
//!
//! - [`ExtractionError`] is caught inside the extractor and degrades to empty text.
//! - [`ClassifierError`] is surfaced as a transient overlay error; the session keeps running.
//! - [`SettingsError`] rejects a `startAnalysis` control message.
//!
//! Parsing the model output never fails; malformed fields fall back to defaults.

use thiserror::Error;

/// Failure while pulling text out of a changed DOM node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// A platform selector could not be parsed.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The changed node is nested deeper than the extractor will walk.
    #[error("node tree exceeds maximum depth of {0}")]
    TooDeep(usize),
}

/// Failure of the remote classification call.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("classification request timed out")]
    Timeout,

    /// The API answered with a non-success HTTP status.
    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body carried an error payload.
    #[error("API error: {0}")]
    Api(String),

    /// The response had no generated text at the expected path.
    #[error("response did not contain generated text")]
    MissingText,

    /// The response body was not valid JSON.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifierError::Timeout
        } else {
            // The request URL never reaches logs or the overlay
            ClassifierError::Transport(err.without_url().to_string())
        }
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::Malformed(err.to_string())
    }
}

/// A settings snapshot that cannot start a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("message count must be at least 1")]
    InvalidMessageCount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = ClassifierError::Status {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "API returned status 403: forbidden");
    }

    #[test]
    fn test_json_error_maps_to_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ClassifierError = json_err.into();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }
}

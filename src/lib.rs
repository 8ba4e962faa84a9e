//! Toxiscope - live toxicity analysis for chat conversations.
//!
//! # Overview
//!
//! A page observer posts DOM change batches. Toxiscope extracts candidate chat
//! messages, keeps a bounded rolling window of the conversation, and at a rate
//! limit sends that window to a remote language model. The model's line-oriented
//! answer is parsed into a structured verdict and turned into an overlay card.
//! Independently, a socket relay delivers externally computed Reddit analyses
//! to the same overlay.
//!
//! # Privacy
//!
//! - Message text is held in memory for the current session only
//! - Analysis history stores verdicts, never message text
//! - API keys and message text are never logged
//!
//! # Modules
//!
//! - [`extractor`]: DOM nodes to candidate messages, per chat platform
//! - [`buffer`]: Deduplicated, bounded conversation window
//! - [`scheduler`]: Cooldown, in-flight gate, and session epoch
//! - [`classifier`]: Prompt construction and the Gemini client
//! - [`parser`]: Model output to [`model::AnalysisResult`]
//! - [`render`]: Healthy streak and card selection
//! - [`overlay`]: The render surface
//! - [`session`]: The lifecycle that ties the pipeline together
//! - [`relay`]: Reddit analysis hub and client
//! - [`storage`]: SQLite settings and history
//! - [`api`]: HTTP API handlers
//! - [`config`]: Environment configuration

pub mod api;
pub mod buffer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod overlay;
pub mod parser;
pub mod relay;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod storage;

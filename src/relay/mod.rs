//! Socket relay for externally computed Reddit analyses.
//!
//! - [`hub`]: server side. Fans every `reddit_analysis` envelope out to all
//!   connected WebSocket subscribers.
//! - [`client`]: page side. Keeps a connection to a hub open, reconnecting after
//!   a fixed delay, and pushes each payload onto the overlay.
//!
//! The relay shares nothing with the analysis session except the overlay.

pub mod client;
pub mod hub;

pub use client::{RECONNECT_DELAY, RelayClient, decode_envelope};
pub use hub::RelayHub;

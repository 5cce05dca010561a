//! Event types for the suggestion resolution stream
//!
//! Events are produced by the iteration controller and forwarded to the caller
//! over the streaming transport. All events are serialized with a `type` tag so
//! clients can dispatch without inspecting payload shapes.

use crate::model::ResolvedItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered events emitted while a playlist request is being resolved
///
/// A stream carries zero or more progress events terminated by exactly one
/// `Complete` or `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaylistEvent {
    /// Free-text progress message
    Status {
        /// Human-readable description of what the pipeline is doing
        message: String,
        /// When the event was produced
        timestamp: DateTime<Utc>,
    },

    /// The pipeline is about to verify a specific candidate against the catalog
    Checking {
        /// Candidate title
        title: String,
        /// Candidate artist
        artist: String,
        /// When the event was produced
        timestamp: DateTime<Utc>,
    },

    /// A new item was verified and added to the playlist
    Song {
        /// The accepted item
        item: ResolvedItem,
        /// Items accepted so far, including this one
        current_count: u32,
        /// Items the caller asked for
        requested_count: u32,
        /// When the event was produced
        timestamp: DateTime<Utc>,
    },

    /// A candidate could not be verified and no substitute was found
    Unavailable {
        /// Candidate title
        title: String,
        /// Candidate artist
        artist: String,
        /// Optional detail on why the candidate was rejected
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// When the event was produced
        timestamp: DateTime<Utc>,
    },

    /// Terminal failure; no `Complete` event follows
    Error {
        /// Description of the failure
        message: String,
        /// True when the catalog credential was rejected even after a refresh
        needs_reauth: bool,
        /// When the event was produced
        timestamp: DateTime<Utc>,
    },

    /// Terminal success; carries the final playlist
    Complete {
        /// Accepted items, truncated to `requested_count`, in acceptance order
        items: Vec<ResolvedItem>,
        /// Total candidates examined across all iterations
        examined: u32,
        /// Number of accepted items
        valid_count: u32,
        /// Items the caller asked for
        requested_count: u32,
        /// True when the session ended early (cancellation or fatal error)
        aborted: bool,
        /// When the event was produced
        timestamp: DateTime<Utc>,
    },
}

impl PlaylistEvent {
    /// Event type string matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PlaylistEvent::Status { .. } => "status",
            PlaylistEvent::Checking { .. } => "checking",
            PlaylistEvent::Song { .. } => "song",
            PlaylistEvent::Unavailable { .. } => "unavailable",
            PlaylistEvent::Error { .. } => "error",
            PlaylistEvent::Complete { .. } => "complete",
        }
    }

    /// True for events that end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaylistEvent::Complete { .. } | PlaylistEvent::Error { .. }
        )
    }
}

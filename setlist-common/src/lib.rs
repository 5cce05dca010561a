//! # Setlist Common Library
//!
//! Shared code for the Setlist services including:
//! - Domain model (Candidate, ResolvedItem, match tiers)
//! - Streaming event types (PlaylistEvent enum)
//! - Error types
//! - Configuration file discovery

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use model::{dedup_key, Candidate, MatchTier, ResolvedItem, SongRef};

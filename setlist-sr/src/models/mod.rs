//! Data models for the suggestion resolution pipeline

pub mod session;

pub use session::{PhaseTransition, PlaylistSession, SessionPhase};

//! Playlist resolution state machine
//!
//! A session progresses SEEDING → DRAINING → REQUESTING → DRAINING → ... and
//! ends in COMPLETE or ABORTED. Draining and Requesting alternate until the
//! quota is met, the iteration budget runs out, or a terminal failure occurs.

use chrono::{DateTime, Utc};
use setlist_common::{dedup_key, ResolvedItem, SongRef};
use uuid::Uuid;

use crate::services::dedup::DedupIndex;

/// Upper bound on Requesting passes per session
pub const MAX_ITERATIONS: u32 = 5;

/// Resolution workflow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initial suggestion request to the Generation Service
    Seeding,
    /// Verifying queued candidates against the catalog
    Draining,
    /// Topping up the candidate queue with feedback
    Requesting,
    /// Session finished; quota met or nothing more to do
    Complete,
    /// Session stopped early: cancellation or session-fatal failure
    Aborted,
}

/// Phase transition record
#[derive(Debug, Clone)]
pub struct PhaseTransition {
    pub session_id: Uuid,
    pub old_phase: SessionPhase,
    pub new_phase: SessionPhase,
    pub transitioned_at: DateTime<Utc>,
}

/// Playlist resolution session (in-memory state)
#[derive(Debug)]
pub struct PlaylistSession {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Current workflow phase
    pub phase: SessionPhase,

    /// Natural-language prompt driving the session
    pub prompt: String,

    /// Number of catalog-verified items the caller asked for
    pub requested_count: u32,

    /// Caller-supplied songs that must never appear in the result
    pub exclusions: Vec<SongRef>,

    /// Accepted items, in acceptance order
    pub valid_items: Vec<ResolvedItem>,

    /// Keys of accepted and excluded songs
    pub seen: DedupIndex,

    /// Candidates actually processed (dedup survivors), for generation avoid-lists
    pub attempted: Vec<SongRef>,

    /// Requesting passes performed so far
    pub iteration: u32,

    /// Requesting pass budget
    pub max_iterations: u32,

    /// Total candidates pulled from the queue, including dedup skips
    pub candidates_examined: u32,

    /// Set when the session stopped before meeting the quota
    pub aborted: bool,

    /// Message describing a session-fatal failure, if one occurred
    pub failure: Option<String>,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time (once terminal)
    pub ended_at: Option<DateTime<Utc>>,
}

impl PlaylistSession {
    /// Create a new session; exclusions seed the dedup index so excluded
    /// songs are silently skipped without events.
    pub fn new(prompt: String, requested_count: u32, exclusions: Vec<SongRef>) -> Self {
        let mut seen = DedupIndex::new();
        seen.seed(
            exclusions
                .iter()
                .map(|song| (song.title.as_str(), song.artist.as_str())),
        );
        Self {
            session_id: Uuid::new_v4(),
            phase: SessionPhase::Seeding,
            prompt,
            requested_count,
            exclusions,
            valid_items: Vec::new(),
            seen,
            attempted: Vec::new(),
            iteration: 0,
            max_iterations: MAX_ITERATIONS,
            candidates_examined: 0,
            aborted: false,
            failure: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new phase
    pub fn transition_to(&mut self, new_phase: SessionPhase) -> PhaseTransition {
        let transition = PhaseTransition {
            session_id: self.session_id,
            old_phase: self.phase,
            new_phase,
            transitioned_at: Utc::now(),
        };
        self.phase = new_phase;

        // Set end time for terminal phases
        match new_phase {
            SessionPhase::Complete | SessionPhase::Aborted => {
                self.ended_at = Some(Utc::now());
            }
            _ => {}
        }

        transition
    }

    /// Check if the session is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, SessionPhase::Complete | SessionPhase::Aborted)
    }

    /// Whether enough items have been accepted
    pub fn quota_met(&self) -> bool {
        self.valid_items.len() as u32 >= self.requested_count
    }

    /// Items still missing from the quota
    pub fn remaining(&self) -> u32 {
        self.requested_count
            .saturating_sub(self.valid_items.len() as u32)
    }

    /// Avoid-list for the next generation request: caller exclusions plus
    /// every pair attempted or accepted so far, deduplicated by key.
    pub fn generation_exclusions(&self) -> Vec<SongRef> {
        let mut keys = std::collections::HashSet::new();
        let mut avoid = Vec::new();
        for song in self.exclusions.iter().chain(self.attempted.iter()) {
            if keys.insert(song.dedup_key()) {
                avoid.push(song.clone());
            }
        }
        for item in &self.valid_items {
            if keys.insert(dedup_key(&item.title, &item.artist)) {
                avoid.push(SongRef {
                    title: item.title.clone(),
                    artist: item.artist.clone(),
                });
            }
        }
        avoid
    }
}

//! Domain model for the suggestion resolution pipeline
//!
//! Shared between the resolver service and its tests. Candidates come from the
//! Generation Service and are never mutated; ResolvedItems are created exactly
//! once per accepted catalog match.

use serde::{Deserialize, Serialize};

/// An unverified suggestion produced by the Generation Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Suggested title as returned by the Generation Service
    pub title: String,
    /// Suggested artist
    pub artist: String,
    /// Release year, when the Generation Service provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Free-text reason why this item fits the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Candidate {
    /// Dedup identity of this candidate
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.title, &self.artist)
    }
}

/// A candidate (or its same-artist substitute) confirmed to exist in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItem {
    /// Title the item is known by in the session (the substitute's title when
    /// `is_alternative` is set)
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Release year carried over from the originating candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Reason carried over from the originating candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Catalog identifier of the matched entry
    pub source_id: String,
    /// Catalog URI of the matched entry
    pub source_uri: String,
    /// Entry name exactly as the catalog returned it
    pub matched_name: String,
    /// Entry artist exactly as the catalog returned it
    pub matched_artist: String,
    /// True when this item substitutes for an unavailable candidate
    pub is_alternative: bool,
    /// Title of the unavailable candidate this item replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
}

impl ResolvedItem {
    /// Dedup identity of this item
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.title, &self.artist)
    }
}

/// A bare `title` + `artist` pair
///
/// Used for caller-supplied exclusions and for the avoid-list sent to the
/// Generation Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRef {
    /// Title
    pub title: String,
    /// Artist
    pub artist: String,
}

impl SongRef {
    /// Dedup identity of this pair
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.title, &self.artist)
    }
}

/// How strongly a catalog entry matched a candidate
///
/// Recorded for observability and assertions; downstream consumers only see
/// the ResolvedItem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTier {
    /// Entry name and artist both equal the query values
    Exact,
    /// Artist equal; title accepted by containment or word-overlap rules
    FuzzyTitleExactArtist,
    /// No acceptable match
    Unmatched,
}

/// Normalized `title|artist` identity used to prevent duplicate items
///
/// Case-insensitive and whitespace-trimmed on both components.
pub fn dedup_key(title: &str, artist: &str) -> String {
    format!(
        "{}|{}",
        title.trim().to_lowercase(),
        artist.trim().to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_normalizes_case_and_whitespace() {
        assert_eq!(dedup_key("Phaedra", "Tangerine Dream"), "phaedra|tangerine dream");
        assert_eq!(
            dedup_key("  PHAEDRA  ", "tangerine DREAM"),
            "phaedra|tangerine dream"
        );
    }

    #[test]
    fn test_dedup_key_distinguishes_artists() {
        assert_ne!(dedup_key("Hurt", "Nine Inch Nails"), dedup_key("Hurt", "Johnny Cash"));
    }

    #[test]
    fn test_candidate_and_item_keys_agree() {
        let candidate = Candidate {
            title: "Rubycon ".to_string(),
            artist: " Tangerine Dream".to_string(),
            year: Some(1975),
            reason: None,
        };
        let item = ResolvedItem {
            title: "rubycon".to_string(),
            artist: "tangerine dream".to_string(),
            year: Some(1975),
            reason: None,
            source_id: "abc".to_string(),
            source_uri: "catalog:track:abc".to_string(),
            matched_name: "Rubycon".to_string(),
            matched_artist: "Tangerine Dream".to_string(),
            is_alternative: false,
            original_title: None,
        };
        assert_eq!(candidate.dedup_key(), item.dedup_key());
    }

    #[test]
    fn test_candidate_deserializes_with_missing_optionals() {
        let candidate: Candidate =
            serde_json::from_str(r#"{"title": "Phaedra", "artist": "Tangerine Dream"}"#)
                .expect("candidate should parse");
        assert_eq!(candidate.year, None);
        assert_eq!(candidate.reason, None);
    }
}

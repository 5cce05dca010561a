//! Tiered match classification
//!
//! Catalog search results are scored against the candidate in two tiers.
//! Exact requires title and artist to agree after canonicalization. The fuzzy
//! tier still requires the artist to agree exactly but accepts title variants
//! through containment (reissue suffixes on longer titles) or word overlap
//! (reordered or lightly edited wording). Both rules carry a 0.7 threshold,
//! so a short title with a long suffix stays Unmatched and a popular track
//! by the right artist never masquerades as the requested one.

use setlist_common::MatchTier;

/// Minimum length ratio for the containment rule
const CONTAINMENT_RATIO: f64 = 0.7;

/// Minimum shared-token ratio for the word-overlap rule
const WORD_OVERLAP_RATIO: f64 = 0.7;

/// Articles and prepositions ignored by the word-overlap rule
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "on", "at", "to", "for", "with",
    "from", "by",
];

/// Lowercase, trim, and collapse internal whitespace runs
pub(crate) fn canon(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify how well a catalog entry matches the candidate.
///
/// `title` should already be the cleaned candidate title; `entry_name` and
/// `entry_artist` come from the catalog result.
pub fn classify_match(
    title: &str,
    artist: &str,
    entry_name: &str,
    entry_artist: &str,
) -> MatchTier {
    let title = canon(title);
    let artist = canon(artist);
    let entry_name = canon(entry_name);
    let entry_artist = canon(entry_artist);

    if artist != entry_artist {
        return MatchTier::Unmatched;
    }
    if title == entry_name {
        return MatchTier::Exact;
    }
    if containment_holds(&title, &entry_name) || word_overlap_holds(&title, &entry_name) {
        return MatchTier::FuzzyTitleExactArtist;
    }
    MatchTier::Unmatched
}

/// One title contains the other and the shorter is at least
/// CONTAINMENT_RATIO of the longer's length.
fn containment_holds(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if !longer.contains(shorter) {
        return false;
    }
    let shorter_len = shorter.chars().count() as f64;
    let longer_len = longer.chars().count() as f64;
    shorter_len / longer_len >= CONTAINMENT_RATIO
}

/// Significant tokens: length > 1, stopwords removed, punctuation stripped
fn significant_tokens(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|token| token.chars().count() > 1)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Shared significant tokens divided by the larger token count
fn word_overlap_holds(a: &str, b: &str) -> bool {
    let tokens_a = significant_tokens(a);
    let tokens_b = significant_tokens(b);
    let denominator = tokens_a.len().max(tokens_b.len());
    if denominator == 0 {
        return false;
    }
    let shared = tokens_a
        .iter()
        .filter(|token| tokens_b.contains(token))
        .count();
    shared as f64 / denominator as f64 >= WORD_OVERLAP_RATIO
}

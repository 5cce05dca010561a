//! Alternative Finder
//!
//! When a candidate has no catalog match, one artist-scoped search looks for
//! a substitute by the same artist. This path is strictly best-effort: any
//! failure, including rate limiting, degrades to "no alternatives" so an
//! optional nicety can never take down a session that direct resolution
//! would have survived.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::services::catalog_client::{CatalogSearch, CatalogTrack, SEARCH_RESULT_LIMIT};
use crate::services::matcher::canon;

/// At most this many substitutes are considered per unavailable candidate
pub const MAX_ALTERNATIVES: usize = 5;

/// Finds substitute tracks by the same artist
pub struct AlternativeFinder {
    catalog: Arc<dyn CatalogSearch>,
}

impl AlternativeFinder {
    pub fn new(catalog: Arc<dyn CatalogSearch>) -> Self {
        Self { catalog }
    }

    /// Up to MAX_ALTERNATIVES tracks by `artist`, in catalog order, skipping
    /// titles on the exclude list. Failures return an empty list.
    pub async fn find_alternatives(
        &self,
        artist: &str,
        exclude_titles: &[String],
        cancel: &CancellationToken,
    ) -> Vec<CatalogTrack> {
        if cancel.is_cancelled() {
            return Vec::new();
        }

        let query = format!("artist:\"{}\"", artist.trim());
        let excluded: Vec<String> = exclude_titles.iter().map(|t| canon(t)).collect();

        match self.catalog.search_tracks(&query, SEARCH_RESULT_LIMIT).await {
            Ok(tracks) => {
                let alternatives: Vec<CatalogTrack> = tracks
                    .into_iter()
                    .filter(|track| !excluded.contains(&canon(&track.name)))
                    .take(MAX_ALTERNATIVES)
                    .collect();
                tracing::debug!(
                    artist = %artist,
                    found = alternatives.len(),
                    "Alternative lookup finished"
                );
                alternatives
            }
            Err(e) => {
                tracing::warn!(
                    artist = %artist,
                    error = %e,
                    "Alternative lookup failed; continuing without substitutes"
                );
                Vec::new()
            }
        }
    }
}

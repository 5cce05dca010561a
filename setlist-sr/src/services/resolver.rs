//! Catalog Resolver
//!
//! Turns one candidate into a catalog-verified item by walking an ordered
//! list of query strategies, strictest first. Each strategy runs one search;
//! its result page is scanned for an Exact match, then a fuzzy one. A
//! rejected credential triggers a single token refresh for the whole
//! resolution attempt; rate limiting and server errors end the session and
//! are surfaced to the controller. Exhausting every strategy is not an
//! error, just "unavailable".

use std::sync::Arc;

use setlist_common::{Candidate, MatchTier, ResolvedItem};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::services::catalog_client::{
    CatalogError, CatalogSearch, CatalogTrack, SEARCH_RESULT_LIMIT,
};
use crate::services::matcher::classify_match;
use crate::services::normalizer::normalize_title;
use crate::services::token_provider::TokenProvider;

/// Session-fatal resolution failures
///
/// Transient per-query problems never surface here; they fall through to the
/// next strategy inside `resolve`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Catalog rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Catalog unavailable: HTTP {0}")]
    CatalogUnavailable(u16),

    #[error("Catalog credential rejected after refresh")]
    NeedsReauth,

    #[error("Resolution cancelled")]
    Cancelled,
}

/// A successful resolution and how strong the match was
#[derive(Debug, Clone)]
pub struct ResolvedMatch {
    pub item: ResolvedItem,
    pub tier: MatchTier,
}

/// One search attempt in the strategy ladder
#[derive(Debug, Clone)]
pub struct QueryStrategy {
    pub label: &'static str,
    pub query: String,
}

/// Ordered query ladder for one candidate, strictest first.
///
/// The original-title rungs only exist when prefix stripping changed the
/// title, covering catalogs that store the combined form.
pub fn build_query_strategies(
    cleaned_title: &str,
    original_title: &str,
    artist: &str,
) -> Vec<QueryStrategy> {
    let mut strategies = vec![
        QueryStrategy {
            label: "quoted title and artist",
            query: format!("track:\"{}\" artist:\"{}\"", cleaned_title, artist),
        },
        QueryStrategy {
            label: "unquoted title and artist",
            query: format!("track:{} artist:{}", cleaned_title, artist),
        },
        QueryStrategy {
            label: "free text",
            query: format!("{} {}", cleaned_title, artist),
        },
        QueryStrategy {
            label: "quoted title only",
            query: format!("track:\"{}\"", cleaned_title),
        },
        QueryStrategy {
            label: "bare title",
            query: cleaned_title.to_string(),
        },
    ];

    if cleaned_title != original_title {
        strategies.push(QueryStrategy {
            label: "quoted original title and artist",
            query: format!("track:\"{}\" artist:\"{}\"", original_title, artist),
        });
        strategies.push(QueryStrategy {
            label: "unquoted original title and artist",
            query: format!("track:{} artist:{}", original_title, artist),
        });
    }

    strategies
}

/// First Exact match in the page, else the first fuzzy one
fn best_match<'a>(
    title: &str,
    artist: &str,
    tracks: &'a [CatalogTrack],
) -> Option<(&'a CatalogTrack, MatchTier)> {
    for track in tracks {
        if classify_match(title, artist, &track.name, &track.artist) == MatchTier::Exact {
            return Some((track, MatchTier::Exact));
        }
    }
    for track in tracks {
        if classify_match(title, artist, &track.name, &track.artist)
            == MatchTier::FuzzyTitleExactArtist
        {
            return Some((track, MatchTier::FuzzyTitleExactArtist));
        }
    }
    None
}

/// Resolves candidates against the Catalog Service
pub struct CatalogResolver {
    catalog: Arc<dyn CatalogSearch>,
    tokens: Arc<dyn TokenProvider>,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn CatalogSearch>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { catalog, tokens }
    }

    /// Resolve one candidate.
    ///
    /// `Ok(None)` means every strategy was exhausted without a match; an
    /// `Err` always ends the session.
    pub async fn resolve(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<Option<ResolvedMatch>, ResolveError> {
        let original_title = candidate.title.trim();
        let artist = candidate.artist.trim();
        let cleaned_title = normalize_title(&candidate.title, &candidate.artist);
        let strategies = build_query_strategies(&cleaned_title, original_title, artist);

        let mut refreshed = false;
        for strategy in &strategies {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            match self.catalog.search_tracks(&strategy.query, SEARCH_RESULT_LIMIT).await {
                Ok(tracks) => {
                    if tracks.is_empty() {
                        tracing::debug!(
                            title = %candidate.title,
                            strategy = strategy.label,
                            "No results; trying next strategy"
                        );
                        continue;
                    }
                    if let Some((track, tier)) = best_match(&cleaned_title, artist, &tracks) {
                        tracing::info!(
                            title = %candidate.title,
                            artist = %candidate.artist,
                            matched = %track.name,
                            strategy = strategy.label,
                            tier = ?tier,
                            "Catalog match found"
                        );
                        return Ok(Some(ResolvedMatch {
                            item: build_item(candidate, track),
                            tier,
                        }));
                    }
                    tracing::debug!(
                        title = %candidate.title,
                        strategy = strategy.label,
                        results = tracks.len(),
                        "Results did not match; trying next strategy"
                    );
                }
                Err(CatalogError::Unauthorized) => {
                    if refreshed {
                        return Err(ResolveError::NeedsReauth);
                    }
                    tracing::warn!("Catalog credential rejected; refreshing token");
                    match self.tokens.force_refresh().await {
                        Ok(_) => {
                            refreshed = true;
                            tracing::info!("Catalog token refreshed");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Catalog token refresh failed");
                            return Err(ResolveError::NeedsReauth);
                        }
                    }
                }
                Err(CatalogError::RateLimited { retry_after_secs }) => {
                    return Err(ResolveError::RateLimited { retry_after_secs });
                }
                Err(CatalogError::ServerError(status)) => {
                    return Err(ResolveError::CatalogUnavailable(status));
                }
                Err(CatalogError::NetworkError(message)) => {
                    tracing::warn!(
                        strategy = strategy.label,
                        error = %message,
                        "Catalog request failed; trying next strategy"
                    );
                }
                Err(CatalogError::ApiError(status, message)) => {
                    tracing::debug!(
                        strategy = strategy.label,
                        status,
                        error = %message,
                        "Catalog rejected query; trying next strategy"
                    );
                }
                Err(CatalogError::ParseError(message)) => {
                    tracing::warn!(
                        strategy = strategy.label,
                        error = %message,
                        "Unparseable catalog response; trying next strategy"
                    );
                }
            }
        }

        tracing::debug!(
            title = %candidate.title,
            artist = %candidate.artist,
            "All query strategies exhausted"
        );
        Ok(None)
    }
}

/// Assemble the outgoing item from the candidate and its catalog entry
fn build_item(candidate: &Candidate, track: &CatalogTrack) -> ResolvedItem {
    ResolvedItem {
        title: candidate.title.trim().to_string(),
        artist: candidate.artist.trim().to_string(),
        year: candidate.year,
        reason: candidate.reason.clone(),
        source_id: track.id.clone(),
        source_uri: track.uri.clone(),
        matched_name: track.name.clone(),
        matched_artist: track.artist.clone(),
        is_alternative: false,
        original_title: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, artist: &str) -> CatalogTrack {
        CatalogTrack {
            id: format!("id-{name}"),
            uri: format!("catalog:track:{name}"),
            name: name.to_string(),
            artist: artist.to_string(),
            year: Some(1974),
        }
    }

    #[test]
    fn test_strategy_ladder_without_cleaning() {
        let strategies = build_query_strategies("Phaedra", "Phaedra", "Tangerine Dream");
        assert_eq!(strategies.len(), 5);
        assert_eq!(
            strategies[0].query,
            "track:\"Phaedra\" artist:\"Tangerine Dream\""
        );
        assert_eq!(strategies[1].query, "track:Phaedra artist:Tangerine Dream");
        assert_eq!(strategies[2].query, "Phaedra Tangerine Dream");
        assert_eq!(strategies[3].query, "track:\"Phaedra\"");
        assert_eq!(strategies[4].query, "Phaedra");
    }

    #[test]
    fn test_strategy_ladder_adds_original_title_rungs() {
        let strategies = build_query_strategies(
            "Phaedra",
            "Tangerine Dream - Phaedra",
            "Tangerine Dream",
        );
        assert_eq!(strategies.len(), 7);
        assert_eq!(
            strategies[5].query,
            "track:\"Tangerine Dream - Phaedra\" artist:\"Tangerine Dream\""
        );
        assert_eq!(
            strategies[6].query,
            "track:Tangerine Dream - Phaedra artist:Tangerine Dream"
        );
    }

    #[test]
    fn test_best_match_prefers_exact_over_earlier_fuzzy() {
        let tracks = vec![
            track("Phaedra 74", "Tangerine Dream"),
            track("Phaedra", "Tangerine Dream"),
        ];
        let (matched, tier) = best_match("Phaedra", "Tangerine Dream", &tracks).unwrap();
        assert_eq!(matched.name, "Phaedra");
        assert_eq!(tier, MatchTier::Exact);
    }

    #[test]
    fn test_best_match_falls_back_to_first_fuzzy() {
        let title = "Mysterious Semblance at the Strand of Nightmares";
        let tracks = vec![
            track("Rubycon", "Klaus Schulze"),
            track(
                "Mysterious Semblance at the Strand of Nightmares (Remastered)",
                "Tangerine Dream",
            ),
        ];
        let (matched, tier) = best_match(title, "Tangerine Dream", &tracks).unwrap();
        assert_eq!(tier, MatchTier::FuzzyTitleExactArtist);
        assert!(matched.name.ends_with("(Remastered)"));
    }

    #[test]
    fn test_best_match_none_when_only_wrong_artists() {
        let tracks = vec![track("Phaedra", "Klaus Schulze")];
        assert!(best_match("Phaedra", "Tangerine Dream", &tracks).is_none());
    }
}

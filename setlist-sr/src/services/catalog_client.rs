//! Catalog Service search client
//!
//! Thin wrapper over the catalog's track search endpoint. Every request is
//! throttled through a shared rate limiter and carries a bearer credential
//! from the token provider. Credential refresh on rejection is the resolver's
//! job; this client only reports what the catalog said.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use thiserror::Error;

use crate::config::CatalogConfig;
use crate::services::token_provider::TokenProvider;

const USER_AGENT: &str = "Setlist/0.1.0 (https://github.com/setlist/setlist)";

/// Pause between consecutive catalog requests
pub const CATALOG_THROTTLE_MS: u64 = 120;

/// Result page size for every search
pub const SEARCH_RESULT_LIMIT: u32 = 20;

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Catalog credential rejected")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Catalog server error: HTTP {0}")]
    ServerError(u16),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One track entry from a catalog search
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTrack {
    /// Catalog identifier
    pub id: String,
    /// Playable URI
    pub uri: String,
    /// Track name as the catalog spells it
    pub name: String,
    /// Primary artist as the catalog spells it
    pub artist: String,
    /// Release year, when the catalog knows it
    pub year: Option<i32>,
}

/// Catalog search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    id: String,
    uri: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistEntry>,
    album: Option<AlbumEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtistEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumEntry {
    release_date: Option<String>,
}

/// Track search seam; mocked in tests
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Run one search query, returning catalog-ordered tracks.
    ///
    /// Implementations throttle and attach credentials; callers see at most
    /// `limit` results.
    async fn search_tracks(&self, query: &str, limit: u32)
        -> Result<Vec<CatalogTrack>, CatalogError>;
}

/// Catalog Service API client
pub struct CatalogClient {
    http_client: reqwest::Client,
    api_base: String,
    market: Option<String>,
    tokens: Arc<dyn TokenProvider>,
    /// Rate limiter: one request per CATALOG_THROTTLE_MS
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl CatalogClient {
    pub fn new(
        config: &CatalogConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let rate_limiter = RateLimiter::direct(
            Quota::with_period(Duration::from_millis(CATALOG_THROTTLE_MS))
                .expect("throttle period is non-zero")
                .allow_burst(NonZeroU32::new(1).expect("1 is non-zero")),
        );

        Ok(Self {
            http_client,
            api_base: config.api_base.clone(),
            market: config.market.clone(),
            tokens,
            rate_limiter,
        })
    }
}

#[async_trait]
impl CatalogSearch for CatalogClient {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        // Wait for a throttle permit before touching the network
        self.rate_limiter.until_ready().await;

        let token = self.tokens.token().await?;

        let url = format!("{}/search", self.api_base);
        let limit_text = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("q", query),
            ("type", "track"),
            ("limit", limit_text.as_str()),
        ];
        if let Some(market) = &self.market {
            params.push(("market", market.as_str()));
        }

        tracing::debug!(query = %query, "Querying catalog search API");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&token.secret)
            .query(&params)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 {
            return Err(CatalogError::Unauthorized);
        }

        if status == 429 {
            let retry_after_secs = parse_retry_after(response.headers());
            return Err(CatalogError::RateLimited { retry_after_secs });
        }

        if status.is_server_error() {
            return Err(CatalogError::ServerError(status.as_u16()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError(status.as_u16(), error_text));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        let tracks = tracks_from_response(parsed);
        tracing::debug!(query = %query, results = tracks.len(), "Catalog search returned");

        Ok(tracks)
    }
}

/// Flatten the wire response into CatalogTrack values, catalog order preserved
fn tracks_from_response(response: SearchResponse) -> Vec<CatalogTrack> {
    let items = match response.tracks {
        Some(page) => page.items,
        None => return Vec::new(),
    };

    items
        .into_iter()
        .map(|entry| {
            let artist = entry
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default();
            let year = entry
                .album
                .as_ref()
                .and_then(|album| album.release_date.as_deref())
                .and_then(release_year);
            CatalogTrack {
                id: entry.id,
                uri: entry.uri,
                name: entry.name,
                artist,
                year,
            }
        })
        .collect()
}

/// Extract the year from a `YYYY`, `YYYY-MM`, or `YYYY-MM-DD` release date
fn release_year(date: &str) -> Option<i32> {
    let prefix: String = date.chars().take(4).collect();
    if prefix.len() < 4 {
        return None;
    }
    prefix.parse().ok()
}

/// Parse a Retry-After header carrying whole seconds
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("Retry-After")
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse().ok())
}

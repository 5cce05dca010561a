//! Mock implementations of the external service seams
//!
//! `MockCatalog` serves a fixed track library the way a search endpoint
//! would: field-scoped queries match by title and artist substring, and
//! `artist:"..."` queries return everything by that artist. Failures can be
//! scripted per call index to exercise the session-fatal paths without a
//! network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use setlist_common::events::PlaylistEvent;
use setlist_common::Candidate;
use setlist_sr::models::PlaylistSession;
use setlist_sr::services::catalog_client::{CatalogError, CatalogSearch, CatalogTrack};
use setlist_sr::services::event_sink::{EventSink, EVENT_CHANNEL_CAPACITY};
use setlist_sr::services::generation_client::{
    GenerationError, SuggestionRequest, SuggestionSource,
};
use setlist_sr::services::orchestrator::SessionOrchestrator;
use setlist_sr::services::token_provider::{AccessToken, TokenProvider};

/// Build a catalog track fixture
pub fn track(name: &str, artist: &str, year: i32) -> CatalogTrack {
    let slug = name.to_lowercase().replace(' ', "-");
    CatalogTrack {
        id: format!("id-{slug}"),
        uri: format!("catalog:track:{slug}"),
        name: name.to_string(),
        artist: artist.to_string(),
        year: Some(year),
    }
}

/// Build a generation candidate fixture
pub fn candidate(title: &str, artist: &str) -> Candidate {
    Candidate {
        title: title.to_string(),
        artist: artist.to_string(),
        year: None,
        reason: None,
    }
}

/// One scripted generation outcome
pub enum GenerationScript {
    Batch(Vec<Candidate>),
    Fail,
}

/// Generation source that replays a script, one entry per call
pub struct MockSuggestionSource {
    script: Mutex<VecDeque<GenerationScript>>,
    requests: Mutex<Vec<SuggestionRequest>>,
}

impl MockSuggestionSource {
    pub fn new(script: Vec<GenerationScript>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// How many times the orchestrator called the generation service
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Copy of every request received, in order
    pub fn requests(&self) -> Vec<SuggestionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuggestionSource for MockSuggestionSource {
    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<Candidate>, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(GenerationScript::Batch(batch)) => Ok(batch),
            Some(GenerationScript::Fail) => Err(GenerationError::ApiError(
                500,
                "scripted generation failure".to_string(),
            )),
            None => Ok(Vec::new()),
        }
    }
}

/// Failure kinds a test can inject into the catalog
#[derive(Debug, Clone, Copy)]
pub enum CatalogFailure {
    Unauthorized,
    RateLimited,
    ServerError,
}

fn failure_to_error(failure: CatalogFailure) -> CatalogError {
    match failure {
        CatalogFailure::Unauthorized => CatalogError::Unauthorized,
        CatalogFailure::RateLimited => CatalogError::RateLimited {
            retry_after_secs: Some(30),
        },
        CatalogFailure::ServerError => CatalogError::ServerError(503),
    }
}

/// In-memory catalog with scripted failures
pub struct MockCatalog {
    library: Vec<CatalogTrack>,
    /// 1-based call index to the failure injected for that call
    failures: Mutex<HashMap<usize, CatalogFailure>>,
    fail_always: Option<CatalogFailure>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn with_library(library: Vec<CatalogTrack>) -> Self {
        Self {
            library,
            failures: Mutex::new(HashMap::new()),
            fail_always: None,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_always(failure: CatalogFailure) -> Self {
        let mut catalog = Self::with_library(Vec::new());
        catalog.fail_always = Some(failure);
        catalog
    }

    /// Inject a failure for the Nth search call (1-based)
    pub fn fail_on_call(self, call: usize, failure: CatalogFailure) -> Self {
        self.failures.lock().unwrap().insert(call, failure);
        self
    }

    /// Delay every search, for cancellation timing tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

/// The artist name from an `artist:"..."`-only query
fn artist_only_query(query: &str) -> Option<String> {
    let rest = query.strip_prefix("artist:\"")?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[async_trait]
impl CatalogSearch for MockCatalog {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        let call_index = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            queries.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.fail_always {
            return Err(failure_to_error(failure));
        }
        if let Some(failure) = self.failures.lock().unwrap().get(&call_index).copied() {
            return Err(failure_to_error(failure));
        }

        let query = query.to_lowercase();
        let results: Vec<CatalogTrack> = if let Some(artist) = artist_only_query(&query) {
            self.library
                .iter()
                .filter(|track| track.artist.to_lowercase() == artist)
                .cloned()
                .collect()
        } else {
            self.library
                .iter()
                .filter(|track| {
                    query.contains(&track.name.to_lowercase())
                        && query.contains(&track.artist.to_lowercase())
                })
                .cloned()
                .collect()
        };

        Ok(results.into_iter().take(limit as usize).collect())
    }
}

/// Token provider that never hits the network
pub struct MockTokens {
    refreshes: Mutex<u32>,
    refresh_fails: bool,
}

impl MockTokens {
    pub fn new() -> Self {
        Self {
            refreshes: Mutex::new(0),
            refresh_fails: false,
        }
    }

    pub fn failing_refresh() -> Self {
        Self {
            refreshes: Mutex::new(0),
            refresh_fails: true,
        }
    }

    pub fn refresh_count(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }
}

#[async_trait]
impl TokenProvider for MockTokens {
    async fn token(&self) -> Result<AccessToken, CatalogError> {
        Ok(AccessToken {
            secret: "test-token".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }

    async fn force_refresh(&self) -> Result<AccessToken, CatalogError> {
        *self.refreshes.lock().unwrap() += 1;
        if self.refresh_fails {
            return Err(CatalogError::Unauthorized);
        }
        self.token().await
    }
}

/// Run one session to its terminal phase, collecting every emitted event
pub async fn run_session(
    generation: Arc<MockSuggestionSource>,
    catalog: Arc<MockCatalog>,
    tokens: Arc<MockTokens>,
    session: PlaylistSession,
) -> (PlaylistSession, Vec<PlaylistEvent>) {
    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let sink = EventSink::new(tx, cancel.clone());
    let orchestrator = SessionOrchestrator::new(generation, catalog, tokens);

    let handle = tokio::spawn(async move { orchestrator.run(session, sink, cancel).await });

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }

    let session = handle.await.expect("session task panicked");
    (session, events)
}

//! Playlist resolution endpoint with SSE streaming
//!
//! POST /playlist/stream validates the request, spawns the session
//! orchestrator, and returns the event stream. Dropping the response stream
//! (client disconnect) cancels the session through a drop guard; the
//! orchestrator notices on its next emit or cancellation check.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use setlist_common::SongRef;

use crate::error::{ApiError, ApiResult};
use crate::models::PlaylistSession;
use crate::services::event_sink::{EventSink, EVENT_CHANNEL_CAPACITY};
use crate::services::orchestrator::SessionOrchestrator;
use crate::AppState;

/// Playlist size when the caller does not specify one
pub const DEFAULT_REQUESTED_COUNT: u32 = 20;

/// Upper bound on the playlist size a caller may request
pub const MAX_REQUESTED_COUNT: u32 = 50;

/// POST /playlist/stream request body
#[derive(Debug, Deserialize)]
pub struct PlaylistStreamRequest {
    /// Natural-language description of the desired playlist
    pub prompt: String,
    /// Desired item count; defaults to DEFAULT_REQUESTED_COUNT
    #[serde(default)]
    pub count: Option<u32>,
    /// Songs that must not appear in the result
    #[serde(default)]
    pub exclusions: Vec<SongRef>,
}

/// POST /playlist/stream - resolve a prompt into a streamed playlist
///
/// Emits `status`, `checking`, `song`, `unavailable`, `error`, and
/// `complete` SSE events; exactly one terminal event ends the stream.
pub async fn playlist_stream(
    State(state): State<AppState>,
    Json(request): Json<PlaylistStreamRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let prompt = request.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }

    let requested_count = request
        .count
        .unwrap_or(DEFAULT_REQUESTED_COUNT)
        .clamp(1, MAX_REQUESTED_COUNT);
    if let Some(raw) = request.count {
        if raw != requested_count {
            debug!(raw, clamped = requested_count, "Clamped requested count");
        }
    }

    let session = PlaylistSession::new(prompt, requested_count, request.exclusions);
    let session_id = session.session_id;
    info!(
        session_id = %session_id,
        requested_count,
        exclusions = session.exclusions.len(),
        "Playlist stream requested"
    );

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let sink = EventSink::new(tx, cancel.clone());

    let orchestrator = SessionOrchestrator::new(
        state.generation.clone(),
        state.catalog.clone(),
        state.tokens.clone(),
    );
    let sessions_completed = state.sessions_completed.clone();
    let last_error = state.last_error.clone();
    let worker_cancel = cancel.clone();
    tokio::spawn(async move {
        let finished = orchestrator.run(session, sink, worker_cancel).await;
        sessions_completed.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = finished.failure {
            *last_error.write().await = Some(message);
        }
    });

    // Cancels the session when the client goes away and the stream drops
    let guard = cancel.drop_guard();
    let stream = async_stream::stream! {
        let _guard = guard;
        debug!(session_id = %session_id, "SSE: Playlist event stream started");

        loop {
            tokio::select! {
                // Heartbeat every 15 seconds
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!(session_id = %session_id, "SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                maybe_event = rx.recv() => {
                    let Some(event) = maybe_event else {
                        break;
                    };
                    let terminal = event.is_terminal();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            yield Ok(Event::default()
                                .event(event.event_type())
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!(
                                session_id = %session_id,
                                error = %e,
                                "SSE: Failed to serialize event"
                            );
                        }
                    }
                    if terminal {
                        break;
                    }
                }
            }
        }

        debug!(session_id = %session_id, "SSE: Playlist event stream closed");
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

/// Build playlist routes
pub fn playlist_routes() -> Router<AppState> {
    Router::new().route("/playlist/stream", post(playlist_stream))
}

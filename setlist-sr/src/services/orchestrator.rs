//! Session orchestration
//!
//! Drives one playlist resolution session through its phases: seed
//! candidates from the Generation Service, drain them through the Catalog
//! Resolver, and top up with feedback-carrying generation passes until the
//! quota is met, the iteration budget runs out, or the session aborts.
//! Candidates are processed strictly one at a time; the catalog client's
//! throttle owns request pacing.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use setlist_common::events::PlaylistEvent;
use setlist_common::{dedup_key, Candidate, ResolvedItem, SongRef};

use crate::models::{PhaseTransition, PlaylistSession, SessionPhase};
use crate::services::alternatives::AlternativeFinder;
use crate::services::catalog_client::CatalogSearch;
use crate::services::event_sink::EventSink;
use crate::services::generation_client::{SuggestionRequest, SuggestionSource};
use crate::services::normalizer::normalize_title;
use crate::services::resolver::{CatalogResolver, ResolveError};
use crate::services::token_provider::TokenProvider;

/// Availability bookkeeping for one draining pass, fed back to generation
#[derive(Debug, Default)]
struct PassReport {
    /// Candidates that resolved to nothing, not even a substitute
    unavailable: Vec<SongRef>,
    /// (requested title, substitute title) pairs accepted this pass
    substitutions: Vec<(String, String)>,
}

/// Session-level orchestrator
pub struct SessionOrchestrator {
    generation: Arc<dyn SuggestionSource>,
    resolver: CatalogResolver,
    alternatives: AlternativeFinder,
}

impl SessionOrchestrator {
    pub fn new(
        generation: Arc<dyn SuggestionSource>,
        catalog: Arc<dyn CatalogSearch>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            generation,
            resolver: CatalogResolver::new(catalog.clone(), tokens),
            alternatives: AlternativeFinder::new(catalog),
        }
    }

    /// Execute the session to a terminal phase.
    ///
    /// On a live transport exactly one terminal event is emitted; once the
    /// transport is gone the session still winds down to a terminal phase
    /// without producing further catalog traffic.
    pub async fn run(
        &self,
        mut session: PlaylistSession,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> PlaylistSession {
        tracing::info!(
            session_id = %session.session_id,
            requested_count = session.requested_count,
            exclusions = session.exclusions.len(),
            "Starting playlist resolution session"
        );

        // Phase: SEEDING
        tracing::info!(session_id = %session.session_id, "Phase: SEEDING");

        let seeding = PlaylistEvent::Status {
            message: "Generating suggestions...".to_string(),
            timestamp: Utc::now(),
        };
        if !sink.emit(seeding).await {
            session.aborted = true;
            return self.finish(session, &sink).await;
        }

        if cancel.is_cancelled() {
            tracing::info!(session_id = %session.session_id, "Session cancelled during seeding");
            session.aborted = true;
            return self.finish(session, &sink).await;
        }

        let mut queue: VecDeque<Candidate> = VecDeque::new();
        let request = SuggestionRequest {
            prompt: session.prompt.clone(),
            desired_count: session.requested_count,
            exclusions: session.generation_exclusions(),
            feedback: None,
        };
        match self.generation.suggest(&request).await {
            Ok(batch) => {
                tracing::info!(
                    session_id = %session.session_id,
                    candidates = batch.len(),
                    "Seed suggestions received"
                );
                let received = batch.len();
                queue.extend(batch);
                let verifying = PlaylistEvent::Status {
                    message: format!("Verifying {} suggestions against the catalog", received),
                    timestamp: Utc::now(),
                };
                if !sink.emit(verifying).await {
                    session.aborted = true;
                    return self.finish(session, &sink).await;
                }
            }
            Err(e) => {
                // The Requesting phase below gets another chance.
                tracing::warn!(
                    session_id = %session.session_id,
                    error = %e,
                    "Seed suggestion request failed"
                );
            }
        }

        loop {
            // Phase: DRAINING
            log_transition(&session.transition_to(SessionPhase::Draining));
            tracing::info!(
                session_id = %session.session_id,
                queued = queue.len(),
                accepted = session.valid_items.len(),
                "Phase: DRAINING"
            );

            let mut report = PassReport::default();
            if let Some((message, needs_reauth)) = self
                .drain_queue(&mut session, &mut queue, &mut report, &sink, &cancel)
                .await
            {
                return self.fail_session(session, message, needs_reauth, &sink).await;
            }

            if session.aborted || session.quota_met() {
                return self.finish(session, &sink).await;
            }
            if session.iteration >= session.max_iterations {
                tracing::info!(
                    session_id = %session.session_id,
                    iterations = session.iteration,
                    "Iteration budget exhausted"
                );
                return self.finish(session, &sink).await;
            }

            // Phase: REQUESTING
            log_transition(&session.transition_to(SessionPhase::Requesting));
            session.iteration += 1;
            tracing::info!(
                session_id = %session.session_id,
                iteration = session.iteration,
                missing = session.remaining(),
                "Phase: REQUESTING"
            );

            let status = PlaylistEvent::Status {
                message: format!(
                    "Requesting {} more suggestions (pass {} of {})",
                    session.remaining(),
                    session.iteration,
                    session.max_iterations
                ),
                timestamp: Utc::now(),
            };
            if !sink.emit(status).await {
                session.aborted = true;
                return self.finish(session, &sink).await;
            }

            if cancel.is_cancelled() {
                tracing::info!(
                    session_id = %session.session_id,
                    "Session cancelled before top-up request"
                );
                session.aborted = true;
                return self.finish(session, &sink).await;
            }

            let request = SuggestionRequest {
                prompt: session.prompt.clone(),
                desired_count: session.remaining(),
                exclusions: session.generation_exclusions(),
                feedback: build_feedback(&report),
            };
            match self.generation.suggest(&request).await {
                Ok(batch) if batch.is_empty() => {
                    tracing::info!(
                        session_id = %session.session_id,
                        "Generation returned no further candidates"
                    );
                    return self.finish(session, &sink).await;
                }
                Ok(batch) => {
                    tracing::info!(
                        session_id = %session.session_id,
                        candidates = batch.len(),
                        "Top-up suggestions received"
                    );
                    queue.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.session_id,
                        error = %e,
                        "Top-up suggestion request failed"
                    );
                    if session.valid_items.is_empty() {
                        return self
                            .fail_session(
                                session,
                                "Generation service produced no usable suggestions".to_string(),
                                false,
                                &sink,
                            )
                            .await;
                    }
                    // Items in hand; the next completion check decides
                    // whether another pass is worthwhile.
                }
            }
        }
    }

    /// Process queued candidates until the quota is met, the queue empties,
    /// or the session aborts. Returns the failure description when the
    /// catalog shut the session down.
    async fn drain_queue(
        &self,
        session: &mut PlaylistSession,
        queue: &mut VecDeque<Candidate>,
        report: &mut PassReport,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Option<(String, bool)> {
        while !session.quota_met() {
            if cancel.is_cancelled() {
                tracing::info!(session_id = %session.session_id, "Session cancelled during draining");
                session.aborted = true;
                return None;
            }
            let Some(candidate) = queue.pop_front() else {
                return None;
            };
            session.candidates_examined += 1;

            let key = candidate.dedup_key();
            if session.seen.seen(&key) {
                tracing::debug!(
                    session_id = %session.session_id,
                    title = %candidate.title,
                    artist = %candidate.artist,
                    "Skipping duplicate candidate"
                );
                continue;
            }
            session.attempted.push(SongRef {
                title: candidate.title.trim().to_string(),
                artist: candidate.artist.trim().to_string(),
            });

            let checking = PlaylistEvent::Checking {
                title: candidate.title.clone(),
                artist: candidate.artist.clone(),
                timestamp: Utc::now(),
            };
            if !sink.emit(checking).await {
                session.aborted = true;
                return None;
            }

            match self.resolver.resolve(&candidate, cancel).await {
                Ok(Some(matched)) => {
                    session.seen.record(key);
                    // Record the cleaned-title alias as well, so a later
                    // re-suggestion under the stripped spelling cannot
                    // duplicate this song.
                    let cleaned = normalize_title(&candidate.title, &candidate.artist);
                    session.seen.record(dedup_key(&cleaned, &candidate.artist));

                    session.valid_items.push(matched.item.clone());
                    tracing::info!(
                        session_id = %session.session_id,
                        title = %matched.item.title,
                        artist = %matched.item.artist,
                        tier = ?matched.tier,
                        accepted = session.valid_items.len(),
                        "Accepted catalog match"
                    );
                    let song = PlaylistEvent::Song {
                        item: matched.item,
                        current_count: session.valid_items.len() as u32,
                        requested_count: session.requested_count,
                        timestamp: Utc::now(),
                    };
                    if !sink.emit(song).await {
                        session.aborted = true;
                        return None;
                    }
                }
                Ok(None) => {
                    if !self
                        .handle_unavailable(session, &candidate, report, sink, cancel)
                        .await
                    {
                        session.aborted = true;
                        return None;
                    }
                }
                Err(ResolveError::Cancelled) => {
                    tracing::info!(
                        session_id = %session.session_id,
                        "Session cancelled mid-resolution"
                    );
                    session.aborted = true;
                    return None;
                }
                Err(e) => {
                    let needs_reauth = matches!(e, ResolveError::NeedsReauth);
                    tracing::error!(
                        session_id = %session.session_id,
                        title = %candidate.title,
                        error = %e,
                        "Session-fatal catalog failure"
                    );
                    return Some((e.to_string(), needs_reauth));
                }
            }
        }
        None
    }

    /// Try a same-artist substitute for an unmatched candidate, falling back
    /// to an `unavailable` event. Returns false when the transport is gone.
    async fn handle_unavailable(
        &self,
        session: &mut PlaylistSession,
        candidate: &Candidate,
        report: &mut PassReport,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> bool {
        let original = candidate.title.trim().to_string();
        let cleaned = normalize_title(&candidate.title, &candidate.artist);
        let mut exclude_titles = vec![original.clone()];
        if cleaned != original {
            exclude_titles.push(cleaned);
        }

        let substitutes = self
            .alternatives
            .find_alternatives(&candidate.artist, &exclude_titles, cancel)
            .await;
        let had_substitutes = !substitutes.is_empty();

        for track in substitutes {
            let key = dedup_key(&track.name, &track.artist);
            if session.seen.seen(&key) {
                continue;
            }
            session.seen.record(key);
            let item = ResolvedItem {
                title: track.name.clone(),
                artist: track.artist.clone(),
                year: track.year,
                reason: candidate.reason.clone(),
                source_id: track.id,
                source_uri: track.uri,
                matched_name: track.name,
                matched_artist: track.artist,
                is_alternative: true,
                original_title: Some(original.clone()),
            };
            session.valid_items.push(item.clone());
            report.substitutions.push((original.clone(), item.title.clone()));
            tracing::info!(
                session_id = %session.session_id,
                requested = %original,
                substitute = %item.title,
                artist = %item.artist,
                "Accepted alternative track"
            );
            let song = PlaylistEvent::Song {
                item,
                current_count: session.valid_items.len() as u32,
                requested_count: session.requested_count,
                timestamp: Utc::now(),
            };
            return sink.emit(song).await;
        }

        report.unavailable.push(SongRef {
            title: original.clone(),
            artist: candidate.artist.trim().to_string(),
        });
        let reason = if had_substitutes {
            "all substitutes already in the playlist"
        } else {
            "not found in catalog"
        };
        tracing::info!(
            session_id = %session.session_id,
            title = %original,
            artist = %candidate.artist,
            reason,
            "Candidate unavailable"
        );
        let unavailable = PlaylistEvent::Unavailable {
            title: original,
            artist: candidate.artist.trim().to_string(),
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
        };
        sink.emit(unavailable).await
    }

    /// Session-fatal exit: flush collected items when any exist, otherwise
    /// emit the terminal error event.
    async fn fail_session(
        &self,
        mut session: PlaylistSession,
        message: String,
        needs_reauth: bool,
        sink: &EventSink,
    ) -> PlaylistSession {
        session.failure = Some(message.clone());
        session.aborted = true;

        if session.valid_items.is_empty() {
            tracing::warn!(
                session_id = %session.session_id,
                needs_reauth,
                "Session failed before accepting any items"
            );
            let error = PlaylistEvent::Error {
                message,
                needs_reauth,
                timestamp: Utc::now(),
            };
            let _ = sink.emit_final(error).await;
            log_transition(&session.transition_to(SessionPhase::Aborted));
            return session;
        }

        let notice = PlaylistEvent::Status {
            message: format!("Stopping early: {}", message),
            timestamp: Utc::now(),
        };
        let _ = sink.emit(notice).await;
        self.finish(session, sink).await
    }

    /// Emit the terminal completion event and close out the session
    async fn finish(&self, mut session: PlaylistSession, sink: &EventSink) -> PlaylistSession {
        session.valid_items.truncate(session.requested_count as usize);

        let complete = PlaylistEvent::Complete {
            items: session.valid_items.clone(),
            examined: session.candidates_examined,
            valid_count: session.valid_items.len() as u32,
            requested_count: session.requested_count,
            aborted: session.aborted,
            timestamp: Utc::now(),
        };
        if !sink.emit_final(complete).await {
            tracing::debug!(
                session_id = %session.session_id,
                "Transport gone before completion event"
            );
        }

        let terminal = if session.aborted {
            SessionPhase::Aborted
        } else {
            SessionPhase::Complete
        };
        log_transition(&session.transition_to(terminal));
        tracing::info!(
            session_id = %session.session_id,
            valid = session.valid_items.len(),
            examined = session.candidates_examined,
            iterations = session.iteration,
            aborted = session.aborted,
            "Playlist resolution session finished"
        );
        session
    }
}

fn log_transition(transition: &PhaseTransition) {
    tracing::debug!(
        session_id = %transition.session_id,
        from = ?transition.old_phase,
        to = ?transition.new_phase,
        "Phase transition"
    );
}

/// Availability summary for the next generation request
fn build_feedback(report: &PassReport) -> Option<String> {
    if report.unavailable.is_empty() && report.substitutions.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if !report.unavailable.is_empty() {
        let listed = report
            .unavailable
            .iter()
            .map(|song| format!("\"{}\" by {}", song.title, song.artist))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!(
            "These suggestions were not found in the catalog: {}.",
            listed
        ));
    }
    if !report.substitutions.is_empty() {
        let listed = report
            .substitutions
            .iter()
            .map(|(wanted, got)| format!("\"{}\" was replaced with \"{}\"", wanted, got))
            .collect::<Vec<_>>()
            .join("; ");
        parts.push(format!("{}.", listed));
    }
    Some(parts.join(" "))
}

//! Pipeline services
//!
//! External clients (generation, catalog, tokens) and the pure pieces of the
//! resolution pipeline (normalizer, matcher, dedup), tied together by the
//! session orchestrator.

pub mod alternatives;
pub mod catalog_client;
pub mod dedup;
pub mod event_sink;
pub mod generation_client;
pub mod matcher;
pub mod normalizer;
pub mod orchestrator;
pub mod resolver;
pub mod token_provider;

pub use alternatives::AlternativeFinder;
pub use catalog_client::{CatalogClient, CatalogError, CatalogSearch, CatalogTrack};
pub use event_sink::{EventSink, EVENT_CHANNEL_CAPACITY};
pub use generation_client::{GenerationClient, GenerationError, SuggestionRequest, SuggestionSource};
pub use orchestrator::SessionOrchestrator;
pub use resolver::{CatalogResolver, ResolveError};
pub use token_provider::{AccessToken, ClientCredentialsProvider, TokenProvider};

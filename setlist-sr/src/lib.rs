//! setlist-sr library interface
//!
//! Exposes the router, state, and pipeline services for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::services::catalog_client::CatalogSearch;
use crate::services::generation_client::SuggestionSource;
use crate::services::token_provider::TokenProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Generation Service client
    pub generation: Arc<dyn SuggestionSource>,
    /// Catalog Service search client
    pub catalog: Arc<dyn CatalogSearch>,
    /// Catalog credential provider
    pub tokens: Arc<dyn TokenProvider>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Sessions that reached a terminal phase since startup
    pub sessions_completed: Arc<AtomicU64>,
    /// Last session failure for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        generation: Arc<dyn SuggestionSource>,
        catalog: Arc<dyn CatalogSearch>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            generation,
            catalog,
            tokens,
            startup_time: Utc::now(),
            sessions_completed: Arc::new(AtomicU64::new(0)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::playlist_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
}

//! Test helper utilities
//!
//! Shared mock services and the session driver for setlist-sr tests.

pub mod mocks;

// Re-export commonly used items
pub use mocks::{
    candidate, run_session, track, CatalogFailure, GenerationScript, MockCatalog,
    MockSuggestionSource, MockTokens,
};

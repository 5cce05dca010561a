//! HTTP API endpoints

pub mod health;
pub mod playlist;

pub use health::health_routes;
pub use playlist::playlist_routes;

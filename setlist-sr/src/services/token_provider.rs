//! Catalog credential management
//!
//! The catalog requires a short-lived bearer token obtained through the
//! client-credentials grant. The provider caches the token and refreshes it
//! ahead of expiry; `force_refresh` exists for the resolver's
//! rejected-credential recovery path.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::CatalogConfig;
use crate::services::catalog_client::{parse_retry_after, CatalogError};

const USER_AGENT: &str = "Setlist/0.1.0 (https://github.com/setlist/setlist)";

/// Tokens within this many seconds of expiry are refreshed eagerly
const EXPIRY_SLACK_SECS: i64 = 60;

/// A bearer credential with its expiry time
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Expired, or close enough to expiry that a request might outlive it
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at - chrono::Duration::seconds(EXPIRY_SLACK_SECS)
    }
}

/// Credential seam; mocked in tests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current credential, fetching a new one when the cache is empty or stale
    async fn token(&self) -> Result<AccessToken, CatalogError>;

    /// Discard the cache and fetch a fresh credential
    async fn force_refresh(&self) -> Result<AccessToken, CatalogError>;
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Client-credentials grant against the catalog's token endpoint
pub struct ClientCredentialsProvider {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: RwLock<Option<AccessToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: RwLock::new(None),
        })
    }

    async fn fetch_token(&self) -> Result<AccessToken, CatalogError> {
        tracing::debug!("Fetching catalog access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
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

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(AccessToken {
            secret: parsed.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn token(&self) -> Result<AccessToken, CatalogError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
        }

        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn force_refresh(&self) -> Result<AccessToken, CatalogError> {
        tracing::info!("Forcing catalog token refresh");
        let mut cached = self.cached.write().await;
        *cached = None;
        let token = self.fetch_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_well_before_expiry_is_fresh() {
        let token = AccessToken {
            secret: "abc".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(3600),
        };
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_inside_slack_window_counts_as_expired() {
        let token = AccessToken {
            secret: "abc".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(EXPIRY_SLACK_SECS / 2),
        };
        assert!(token.is_expired());
    }

    #[test]
    fn test_token_response_parses() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc123", "expires_in": 3600, "token_type": "Bearer"}"#)
                .unwrap();
        assert_eq!(parsed.access_token, "abc123");
        assert_eq!(parsed.expires_in, 3600);
    }
}

//! HTTP client for the signing service account's JWK set.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use elevia_application::{service_account_jwks_url, JwksClient};
use elevia_core::{AppError, AppResult};
use elevia_domain::UserId;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;
use tracing::debug;

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Fetches a JWK set over HTTP and caches it for a refresh interval.
///
/// The HTTP client is shared with the rest of the process; only the key
/// cache is owned here.
pub struct HttpJwksClient {
    http_client: reqwest::Client,
    url: String,
    refresh_interval: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl HttpJwksClient {
    /// Creates a client for an explicit JWKS URL.
    #[must_use]
    pub fn new(http_client: reqwest::Client, url: String, refresh_interval: Duration) -> Self {
        Self {
            http_client,
            url,
            refresh_interval,
            cache: RwLock::new(None),
        }
    }

    /// Creates a client for a service account's well-known JWKS URL.
    #[must_use]
    pub fn for_service_account(
        http_client: reqwest::Client,
        service_account: &UserId,
        refresh_interval: Duration,
    ) -> Self {
        Self::new(
            http_client,
            service_account_jwks_url(service_account),
            refresh_interval,
        )
    }

    /// Returns the JWKS URL this client reads from.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch(&self) -> AppResult<JwkSet> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|error| {
                AppError::Transient(format!("failed to fetch JWKs from '{}': {error}", self.url))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Transient(format!(
                "JWKS endpoint '{}' returned status {}",
                self.url,
                response.status()
            )));
        }

        response.json::<JwkSet>().await.map_err(|error| {
            AppError::Transient(format!("failed to parse JWKs from '{}': {error}", self.url))
        })
    }
}

#[async_trait]
impl JwksClient for HttpJwksClient {
    async fn fetch_keys(&self) -> AppResult<JwkSet> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.refresh_interval {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys = self.fetch().await?;
        debug!(url = self.url.as_str(), keys = keys.keys.len(), "refreshed JWK set");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }
}

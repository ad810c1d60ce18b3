use async_trait::async_trait;
use elevia_core::AppResult;
use elevia_domain::UserId;
use jsonwebtoken::jwk::JwkSet;

/// Client for the cloud credentials service that holds the signing
/// service account's managed key.
#[async_trait]
pub trait CredentialsClient: Send + Sync {
    /// Signs the JSON payload as a JWT (RS256) with the service
    /// account's managed key and returns the compact encoding.
    async fn sign_jwt(
        &self,
        service_account: &UserId,
        payload: &serde_json::Value,
    ) -> AppResult<String>;
}

/// Source of the signing service account's current JWK set.
///
/// Implementations should cache the keys and refresh them at an interval
/// bounded by the keys' stated validity.
#[async_trait]
pub trait JwksClient: Send + Sync {
    /// Returns the current JWK set.
    async fn fetch_keys(&self) -> AppResult<JwkSet>;
}

/// Derives the well-known JWKS URL for a service account.
#[must_use]
pub fn service_account_jwks_url(service_account: &UserId) -> String {
    format!(
        "https://www.googleapis.com/service_accounts/v1/metadata/jwk/{}",
        service_account.email()
    )
}

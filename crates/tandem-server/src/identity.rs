//! Token verification against the external identity provider.

use serde::Deserialize;
use std::time::Duration;
use tandem_types::AuthenticatedUser;

/// Timeout for one verification round-trip. A hung identity provider must
/// not stall the request path longer than this.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wire shape of the identity provider's user endpoint response.
#[derive(Debug, Deserialize)]
struct IdentityResponse {
    id: String,
    organization_id: String,
}

/// Resolves bearer tokens to authenticated users via the external identity
/// provider.
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    http: reqwest::Client,
    url: String,
}

impl IdentityVerifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Verifies a token. Any failure along the way — transport error,
    /// non-success status, unparseable body — yields `None`: an
    /// unreachable identity provider means unauthenticated, never a
    /// server error surfaced to the caller.
    pub async fn verify(&self, token: &str) -> Option<AuthenticatedUser> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(token)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| tracing::debug!("identity provider unreachable: {}", e))
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "token rejected by identity provider");
            return None;
        }

        let identity: IdentityResponse = response
            .json()
            .await
            .map_err(|e| tracing::warn!("unparseable identity provider response: {}", e))
            .ok()?;

        Some(AuthenticatedUser {
            user_id: identity.id,
            organization_id: identity.organization_id,
        })
    }
}

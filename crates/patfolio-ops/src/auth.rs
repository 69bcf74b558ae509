//! OAuth2 client-credentials exchange against the OPS gateway.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{OpsError, Result};
use crate::http::RateLimitedClient;

/// Refresh this long before the reported expiry to avoid racing it.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// The gateway reports token lifetime; if it ever stops doing so, assume this.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(20 * 60);

/// Consumer key/secret pair for the OPS developer account. Always passed in
/// explicitly — the library never reads the process environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }
}

struct CachedToken {
    bearer: String,
    expires_at: Instant,
}

/// Owns the session token: fetches it on first use and refreshes it ahead of
/// expiry. Nothing outside this type ever sees credentials or raw tokens.
pub struct TokenManager {
    credentials: Credentials,
    auth_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, auth_url: impl Into<String>) -> Self {
        Self {
            credentials,
            auth_url: auth_url.into(),
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, exchanging credentials if none is held or the
    /// held one is about to expire.
    pub async fn bearer(&self, http: &RateLimitedClient) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref()
            && Instant::now() < cached.expires_at
        {
            return Ok(cached.bearer.clone());
        }

        let (bearer, lifetime) = self.exchange(http).await?;
        debug!(lifetime_secs = lifetime.as_secs(), "obtained OPS access token");
        *slot = Some(CachedToken {
            bearer: bearer.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(bearer)
    }

    async fn exchange(&self, http: &RateLimitedClient) -> Result<(String, Duration)> {
        let body = http
            .post_form_basic_auth(
                &self.auth_url,
                &self.credentials.consumer_key,
                &self.credentials.consumer_secret,
                &[("grant_type", "client_credentials")],
            )
            .await?;

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| OpsError::Auth(format!("token response is not JSON: {e}")))?;
        let token = payload["access_token"]
            .as_str()
            .ok_or_else(|| OpsError::Auth("token response carries no access_token".to_string()))?;

        // The gateway serves expires_in as a string of seconds; tolerate a
        // numeric rendering too.
        let lifetime = payload["expires_in"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| payload["expires_in"].as_u64())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);

        Ok((token.to_string(), lifetime))
    }
}

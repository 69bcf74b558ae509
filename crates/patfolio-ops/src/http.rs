//! Rate-limited HTTP transport and the on-disk response cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::error::{OpsError, Result};

// ─── RateLimitedClient ──────────────────────────────────────────────────────

/// HTTP client honoring the provider's fair-use charter: a mandatory minimum
/// interval between consecutive requests, `Retry-After` on 429, exponential
/// backoff on transport failures. 404 surfaces as [`OpsError::NotFound`] so
/// callers can fall back to an alternate endpoint rendering.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    max_retries: u32,
}

pub struct FetchedResponse {
    pub headers: HeaderMap,
    pub body: String,
}

impl RateLimitedClient {
    pub fn new(
        min_interval: Duration,
        max_retries: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            min_interval,
            next_slot: Mutex::new(None),
            max_retries,
        }
    }

    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<String> {
        self.get_full(url, headers).await.map(|fetched| fetched.body)
    }

    pub async fn get_full(&self, url: &str, headers: HeaderMap) -> Result<FetchedResponse> {
        let response = self
            .execute(url, || self.client.get(url).headers(headers.clone()))
            .await?;
        let headers = response.headers().clone();
        let body = response.text().await.map_err(OpsError::Http)?;
        Ok(FetchedResponse { headers, body })
    }

    /// Form POST with HTTP basic auth — the shape of an OAuth2
    /// client-credentials exchange. Every failure mode of the token endpoint
    /// maps to [`OpsError::Auth`], which is fatal for a batch.
    pub async fn post_form_basic_auth(
        &self,
        url: &str,
        username: &str,
        password: &str,
        form: &[(&str, &str)],
    ) -> Result<String> {
        let response = self
            .execute(url, || {
                self.client
                    .post(url)
                    .basic_auth(username, Some(password))
                    .form(form)
            })
            .await
            .map_err(|err| match err {
                OpsError::Api(_, detail) | OpsError::NotFound(detail) => OpsError::Auth(detail),
                other => other,
            })?;
        response.text().await.map_err(OpsError::Http)
    }

    /// One logical request through the retry ladder.
    async fn execute(&self, url: &str, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            self.acquire_slot().await;
            match build().send().await {
                Ok(response) => match response.status() {
                    StatusCode::TOO_MANY_REQUESTS if attempt < self.max_retries => {
                        sleep(Duration::from_secs(retry_after_seconds(&response))).await;
                        attempt += 1;
                    }
                    StatusCode::TOO_MANY_REQUESTS => {
                        return Err(OpsError::RateLimit(
                            url.to_string(),
                            retry_after_seconds(&response),
                        ));
                    }
                    StatusCode::NOT_FOUND => return Err(OpsError::NotFound(url.to_string())),
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        return Err(OpsError::Auth(describe_failure(response).await));
                    }
                    status if !status.is_success() => {
                        return Err(OpsError::Api(
                            url.to_string(),
                            describe_failure(response).await,
                        ));
                    }
                    _ => return Ok(response),
                },
                Err(err) if attempt < self.max_retries => {
                    tracing::warn!(error = %err, attempt, "transport error, backing off");
                    sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    attempt += 1;
                }
                Err(err) => return Err(OpsError::Http(err)),
            }
        }
    }

    /// Wait out the fair-use interval and reserve the next request slot.
    async fn acquire_slot(&self) {
        let mut slot = self.next_slot.lock().await;
        let now = Instant::now();
        if let Some(at) = *slot
            && at > now
        {
            sleep(at - now).await;
        }
        *slot = Some(Instant::now() + self.min_interval);
    }
}

fn retry_after_seconds(response: &Response) -> u64 {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(60)
}

async fn describe_failure(response: Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {status}: {body}")
}

// ─── ResponseCache ──────────────────────────────────────────────────────────

/// Retrieved payloads kept on disk for a TTL, so re-running an analysis does
/// not spend the provider's request budget twice on unchanged records.
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

#[derive(Serialize, serde::Deserialize)]
struct StoredEntry<T> {
    stored_at: DateTime<Utc>,
    value: T,
}

impl ResponseCache {
    pub fn new(namespace: &str, ttl: Duration) -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("patfolio")
            .join("cache")
            .join(namespace);
        let _ = std::fs::create_dir_all(&dir);
        Self { dir, ttl }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }

    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let entry: StoredEntry<T> = serde_json::from_slice(&bytes).ok()?;

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        if Utc::now().signed_duration_since(entry.stored_at) > ttl {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        Some(entry.value)
    }

    pub async fn store<T: Serialize>(&self, key: &str, value: &T) {
        let entry = StoredEntry {
            stored_at: Utc::now(),
            value,
        };
        if let Ok(bytes) = serde_json::to_vec(&entry) {
            let _ = tokio::fs::write(self.entry_path(key), bytes).await;
        }
    }
}

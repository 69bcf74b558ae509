use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use patfolio_core::navigate::{as_sequence, first_text};

use crate::auth::{Credentials, TokenManager};
use crate::epnumber::EpNumber;
use crate::error::{OpsError, Result};
use crate::http::{RateLimitedClient, ResponseCache};
use crate::ipc::IpcSubclass;

/// Publication used by the connection probe; known to resolve.
const PROBE_PUBLICATION: &str = "EP19196837A";

#[derive(Debug, Clone)]
pub struct OpsConfig {
    pub base_url: String,
    pub auth_url: String,
    /// Minimum delay between consecutive requests (fair-use charter).
    pub min_interval: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub cache_namespace: String,
    pub cache_ttl: Duration,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ops.epo.org/3.2/rest-services".to_string(),
            auth_url: "https://ops.epo.org/3.2/auth/accesstoken".to_string(),
            min_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            cache_namespace: "biblio".to_string(),
            cache_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// One successful bibliographic retrieval: the raw payload plus the endpoint
/// rendering that resolved it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiblioResponse {
    pub publication: String,
    pub data: Value,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcSearchHit {
    pub country: String,
    pub number: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcSearchResult {
    /// Total match count as reported by the gateway; `None` when it reports
    /// nothing usable.
    pub total_results: Option<u64>,
    pub hits: Vec<IpcSearchHit>,
}

/// Authenticated client for the OPS published-data services. All requests go
/// through one rate-limited HTTP client, strictly sequentially.
pub struct OpsClient {
    http: RateLimitedClient,
    auth: TokenManager,
    cache: ResponseCache,
    base_url: String,
}

impl OpsClient {
    pub fn new(credentials: Credentials, config: OpsConfig) -> Self {
        let http = RateLimitedClient::new(
            config.min_interval,
            config.max_retries,
            config.timeout,
            "patfolio/0.1",
        );
        Self {
            http,
            auth: TokenManager::new(credentials, config.auth_url),
            cache: ResponseCache::new(&config.cache_namespace, config.cache_ttl),
            base_url: config.base_url,
        }
    }

    async fn authed_headers(&self) -> Result<HeaderMap> {
        let bearer = self.auth.bearer(&self.http).await?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|e| OpsError::Parse(format!("unusable bearer token: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        // The gateway defaults to XML; JSON must be asked for.
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Bibliographic data for one application. Tries the era-aware epodoc
    /// rendering first, then the zero-stripped alternate some records are
    /// filed under.
    pub async fn fetch_biblio(&self, number: &EpNumber) -> Result<BiblioResponse> {
        let cache_key = format!("biblio:{}", number.epodoc());
        if let Some(cached) = self.cache.lookup::<BiblioResponse>(&cache_key).await {
            debug!(publication = %number, "biblio served from cache");
            return Ok(cached);
        }

        let headers = self.authed_headers().await?;
        for candidate in number.endpoint_candidates() {
            let url = format!(
                "{}/published-data/application/epodoc/{}/biblio",
                self.base_url, candidate
            );
            match self.http.get(&url, headers.clone()).await {
                Ok(body) => {
                    let data: Value = serde_json::from_str(&body)
                        .map_err(|e| OpsError::Parse(e.to_string()))?;
                    let response = BiblioResponse {
                        publication: candidate,
                        data,
                        retrieved_at: Utc::now(),
                    };
                    self.cache.store(&cache_key, &response).await;
                    return Ok(response);
                }
                Err(OpsError::NotFound(_)) => {
                    debug!(candidate = %candidate, "endpoint format not found, trying next");
                }
                Err(other) => return Err(other),
            }
        }

        Err(OpsError::NotFound(format!(
            "{} not found under any endpoint format",
            number.raw
        )))
    }

    /// Published-data search by IPC subclass. The total comes from the
    /// `X-Total-Results` header when present, else from the payload.
    pub async fn search_by_ipc(&self, subclass: &IpcSubclass) -> Result<IpcSearchResult> {
        let headers = self.authed_headers().await?;
        let query = format!("ic={}", subclass.code());
        let url = format!(
            "{}/published-data/search?q={}",
            self.base_url,
            urlencoding::encode(&query)
        );

        let fetched = self.http.get_full(&url, headers).await?;
        let data: Value =
            serde_json::from_str(&fetched.body).map_err(|e| OpsError::Parse(e.to_string()))?;

        let total_results = fetched
            .headers
            .get("X-Total-Results")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| {
                let count = &data["ops:world-patent-data"]["ops:biblio-search"]
                    ["@total-result-count"];
                count
                    .as_str()
                    .and_then(|s| s.parse::<u64>().ok())
                    .or_else(|| count.as_u64())
            });

        let references = &data["ops:world-patent-data"]["ops:biblio-search"]["ops:search-result"]
            ["ops:publication-reference"];
        let mut hits = Vec::new();
        for entry in as_sequence(references) {
            let docdb = as_sequence(&entry["document-id"])
                .iter()
                .find(|id| id["@document-id-type"].as_str() == Some("docdb"));
            let Some(doc_id) = docdb else { continue };
            let (Some(country), Some(number), Some(kind)) = (
                first_text(&doc_id["country"]),
                first_text(&doc_id["doc-number"]),
                first_text(&doc_id["kind"]),
            ) else {
                continue;
            };
            hits.push(IpcSearchHit {
                country: country.to_string(),
                number: number.to_string(),
                kind: kind.to_string(),
            });
        }

        Ok(IpcSearchResult {
            total_results,
            hits,
        })
    }

    /// Cheap end-to-end probe: can we authenticate and resolve a known
    /// publication?
    pub async fn test_connection(&self) -> bool {
        match EpNumber::parse(PROBE_PUBLICATION) {
            Ok(number) => self.fetch_biblio(&number).await.is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(server: &mockito::ServerGuard, namespace: &str) -> OpsConfig {
        OpsConfig {
            base_url: server.url(),
            auth_url: format!("{}/auth/accesstoken", server.url()),
            min_interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
            max_retries: 0,
            cache_namespace: format!("test_{namespace}_{}", std::process::id()),
            cache_ttl: Duration::from_secs(60),
        }
    }

    async fn mock_auth(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/auth/accesstoken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "tok-abc", "expires_in": "1199"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn fetches_biblio_with_bearer_and_json_accept() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _biblio = server
            .mock("GET", "/published-data/application/epodoc/EP19196837/biblio")
            .match_header("authorization", "Bearer tok-abc")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ops:world-patent-data": {"exchange-documents": {}}}"#)
            .create_async()
            .await;

        let client = OpsClient::new(
            Credentials::new("key", "secret"),
            test_config(&server, "fetch"),
        );
        let number = EpNumber::parse("EP19196837A").unwrap();
        let response = client.fetch_biblio(&number).await.unwrap();

        assert_eq!(response.publication, "EP19196837");
        assert!(response.data["ops:world-patent-data"].is_object());
    }

    #[tokio::test]
    async fn falls_back_to_zero_stripped_endpoint_format() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _first = server
            .mock("GET", "/published-data/application/epodoc/EP08150237/biblio")
            .with_status(404)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/published-data/application/epodoc/EP8150237/biblio")
            .with_status(200)
            .with_body(r#"{"ops:world-patent-data": {}}"#)
            .create_async()
            .await;

        let client = OpsClient::new(
            Credentials::new("key", "secret"),
            test_config(&server, "fallback"),
        );
        let number = EpNumber::parse("EP08150237").unwrap();
        let response = client.fetch_biblio(&number).await.unwrap();
        assert_eq!(response.publication, "EP8150237");
    }

    #[tokio::test]
    async fn missing_everywhere_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _any = server
            .mock(
                "GET",
                mockito::Matcher::Regex("^/published-data/application/.*".into()),
            )
            .with_status(404)
            .expect_at_least(1)
            .create_async()
            .await;

        let client = OpsClient::new(
            Credentials::new("key", "secret"),
            test_config(&server, "missing"),
        );
        let number = EpNumber::parse("EP00999999").unwrap();
        let err = client.fetch_biblio(&number).await.unwrap_err();
        assert!(matches!(err, OpsError::NotFound(_)));
    }

    #[tokio::test]
    async fn auth_failure_aborts_before_any_fetch() {
        let mut server = mockito::Server::new_async().await;
        let _auth = server
            .mock("POST", "/auth/accesstoken")
            .with_status(401)
            .with_body("invalid_client")
            .create_async()
            .await;

        let client = OpsClient::new(
            Credentials::new("bad", "creds"),
            test_config(&server, "authfail"),
        );
        let number = EpNumber::parse("EP3377490").unwrap();
        let err = client.fetch_biblio(&number).await.unwrap_err();
        assert!(matches!(err, OpsError::Auth(_)));
    }

    #[tokio::test]
    async fn ipc_search_reads_header_total_and_docdb_hits() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _search = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/published-data/search\?q=ic%3DA61K$".into()),
            )
            .with_status(200)
            .with_header("X-Total-Results", "51342")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "ops:world-patent-data": {
                    "ops:biblio-search": {
                        "@total-result-count": "51342",
                        "ops:search-result": {
                            "ops:publication-reference": [
                                {"document-id": {"@document-id-type": "docdb",
                                    "country": {"$": "EP"},
                                    "doc-number": {"$": "3377490"},
                                    "kind": {"$": "A1"}}},
                                {"document-id": [
                                    {"@document-id-type": "epodoc",
                                     "doc-number": {"$": "EP3377491"}},
                                    {"@document-id-type": "docdb",
                                     "country": {"$": "EP"},
                                     "doc-number": {"$": "3377491"},
                                     "kind": {"$": "B1"}}]}
                            ]
                        }
                    }
                }
            }"#,
            )
            .create_async()
            .await;

        let client = OpsClient::new(
            Credentials::new("key", "secret"),
            test_config(&server, "search"),
        );
        let subclass = IpcSubclass::parse("A61K").unwrap();
        let result = client.search_by_ipc(&subclass).await.unwrap();

        assert_eq!(result.total_results, Some(51342));
        assert_eq!(result.hits.len(), 2);
        assert_eq!(
            result.hits[0],
            IpcSearchHit {
                country: "EP".to_string(),
                number: "3377490".to_string(),
                kind: "A1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn search_total_falls_back_to_payload_count() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _search = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/published-data/search.*".into()),
            )
            .with_status(200)
            .with_body(
                r#"{"ops:world-patent-data": {"ops:biblio-search": {
                    "@total-result-count": "7"}}}"#,
            )
            .create_async()
            .await;

        let client = OpsClient::new(
            Credentials::new("key", "secret"),
            test_config(&server, "searchtotal"),
        );
        let subclass = IpcSubclass::parse("B66B").unwrap();
        let result = client.search_by_ipc(&subclass).await.unwrap();
        assert_eq!(result.total_results, Some(7));
        assert!(result.hits.is_empty());
    }
}

//! Fetcher for curator-hosted metadata documents.
//!
//! A package may point at a JSON document describing its compatibility. That
//! document lives on a third-party host, so every failure here is soft: a bad
//! scheme, a timeout, a non-2xx status or an invalid body all yield `None`
//! with a warning, are never retried, and never abort a collection run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, warn};

use crate::config::MetadataConfig;
use crate::error::{RegistryError, Result};

use super::schema::{validate_metadata, ExternalMetadata, Validation};

const METADATA_USER_AGENT: &str = concat!("vite-plugin-registry/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;

type CacheSlot = Arc<OnceCell<Option<ExternalMetadata>>>;

/// Fetches and validates metadata documents, memoizing results per URL.
///
/// Negative results are cached too: a URL that failed once is not requested
/// again until [`MetadataFetcher::clear_cache`] is called. Concurrent fetches
/// of the same URL share one request.
#[derive(Debug)]
pub struct MetadataFetcher {
    http: Client,
    semaphore: Semaphore,
    timeout: Duration,
    cache: Mutex<HashMap<String, CacheSlot>>,
    require_https: bool,
    requests: AtomicU64,
}

impl MetadataFetcher {
    /// Create a fetcher with the default limits (5 concurrent, 5s timeout).
    pub fn new() -> Result<Self> {
        Self::from_config(&MetadataConfig::default())
    }

    /// Create a fetcher from the `metadata` config section.
    pub fn from_config(config: &MetadataConfig) -> Result<Self> {
        Ok(Self {
            http: build_http(true)?,
            semaphore: Semaphore::new(config.concurrency.max(1)),
            timeout: Duration::from_millis(config.timeout_ms),
            cache: Mutex::new(HashMap::new()),
            require_https: true,
            requests: AtomicU64::new(0),
        })
    }

    /// Accept plain-http URLs (wiremock serves http only).
    #[cfg(test)]
    pub(crate) fn allow_plain_http(mut self) -> Result<Self> {
        self.http = build_http(false)?;
        self.require_https = false;
        Ok(self)
    }

    /// Fetch the document at `url`, or `None` if it is unusable.
    pub async fn fetch(&self, url: &str) -> Option<ExternalMetadata> {
        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(url.to_string()).or_default())
        };

        slot.get_or_init(|| self.fetch_uncached(url)).await.clone()
    }

    /// Forget every cached result.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of URLs with a cached (or in-flight) result.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Network requests issued since construction.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    async fn fetch_uncached(&self, url: &str) -> Option<ExternalMetadata> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(url, error = %e, "Invalid metadata URL");
                return None;
            }
        };

        if self.require_https && parsed.scheme() != "https" {
            warn!(url, "Metadata URL must be HTTPS");
            return None;
        }

        let _permit = self.semaphore.acquire().await.ok()?;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let body = match tokio::time::timeout(self.timeout, self.request(parsed)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!(url, error = %e, "Metadata fetch failed");
                return None;
            }
            Err(_) => {
                warn!(url, timeout_ms = self.timeout.as_millis() as u64, "Metadata fetch timed out");
                return None;
            }
        };

        match validate_metadata(&body) {
            Validation::Valid(metadata) => {
                debug!(url, "Fetched metadata");
                Some(metadata)
            }
            Validation::Invalid(violations) => {
                let details = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(url, violations = %details, "Invalid metadata format");
                None
            }
        }
    }

    async fn request(&self, url: Url) -> Result<Value> {
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, METADATA_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// HTTP client whose redirects stay within the scheme rule.
fn build_http(require_https: bool) -> Result<Client> {
    let policy = Policy::custom(move |attempt| {
        if should_follow(attempt.url(), attempt.previous().len(), require_https) {
            attempt.follow()
        } else {
            attempt.stop()
        }
    });
    Ok(Client::builder().redirect(policy).build()?)
}

/// Whether a redirect to `target` after `hops` earlier requests is followed.
/// A stopped redirect surfaces as a non-success status.
fn should_follow(target: &Url, hops: usize, require_https: bool) -> bool {
    if hops > MAX_REDIRECTS {
        return false;
    }
    !require_https || target.scheme() == "https"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::ToolCompatibility;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn valid_doc() -> Value {
        json!({
            "schemaVersion": 1,
            "compatibility": { "rolldown": { "type": "compatible", "versions": "^1.0.0" } }
        })
    }

    fn test_fetcher() -> MetadataFetcher {
        MetadataFetcher::new().unwrap().allow_plain_http().unwrap()
    }

    #[tokio::test]
    async fn test_rejects_non_https_without_request() {
        let fetcher = MetadataFetcher::new().unwrap();
        assert!(fetcher.fetch("http://example.com/meta.json").await.is_none());
        assert!(fetcher.fetch("ftp://example.com/meta.json").await.is_none());
        assert!(fetcher.fetch("not a url").await.is_none());
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_valid_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(valid_doc()))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let meta = fetcher
            .fetch(&format!("{}/meta.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(
            meta.compatibility.unwrap().rolldown,
            Some(ToolCompatibility::compatible("^1.0.0"))
        );
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(valid_doc()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/meta.json", server.uri());
        let first = fetcher.fetch(&url).await;
        let second = fetcher.fetch(&url).await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_negative_result_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.json"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/missing.json", server.uri());
        assert!(fetcher.fetch(&url).await.is_none());
        assert!(fetcher.fetch(&url).await.is_none());
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(valid_doc()))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/meta.json", server.uri());
        fetcher.fetch(&url).await;
        assert_eq!(fetcher.cached_len(), 1);
        fetcher.clear_cache();
        assert_eq!(fetcher.cached_len(), 0);
        fetcher.fetch(&url).await;
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "schemaVersion": 2 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        assert!(fetcher.fetch(&format!("{}/v2.json", server.uri())).await.is_none());
        assert!(fetcher.fetch(&format!("{}/html", server.uri())).await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_soft_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(valid_doc())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = MetadataFetcher::from_config(&MetadataConfig {
            concurrency: 5,
            timeout_ms: 50,
        })
        .unwrap()
        .allow_plain_http()
        .unwrap();

        let started = std::time::Instant::now();
        assert!(fetcher.fetch(&format!("{}/slow.json", server.uri())).await.is_none());
        assert!(started.elapsed() < Duration::from_millis(450));
    }

    #[test]
    fn test_redirect_downgrade_is_not_followed() {
        let https = Url::parse("https://cdn.example.com/meta.json").unwrap();
        let http = Url::parse("http://cdn.example.com/meta.json").unwrap();

        assert!(should_follow(&https, 1, true));
        assert!(!should_follow(&http, 1, true));
        assert!(should_follow(&http, 1, false));
        assert!(!should_follow(&https, MAX_REDIRECTS + 1, true));
    }

    #[tokio::test]
    async fn test_redirect_is_followed_when_scheme_allowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/moved.json"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/meta.json", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(valid_doc()))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        assert!(fetcher
            .fetch(&format!("{}/moved.json", server.uri()))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(valid_doc())
                    .set_delay(Duration::from_millis(20)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/meta.json", server.uri());
        let (a, b) = tokio::join!(fetcher.fetch(&url), fetcher.fetch(&url));
        assert!(a.is_some());
        assert_eq!(a, b);
    }
}

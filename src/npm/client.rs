//! Rate-limited npm registry client.
//!
//! Every request goes through one [`RequestQueue`] (30 concurrent by default)
//! and the [`retry`] driver. Searches page through `/-/v1/search` 250 hits at
//! a time, one page after another for a given call; different calls
//! interleave freely on the shared queue.

use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

use super::queue::RequestQueue;
use super::retry::{retry, Outcome, RetryPolicy};
use super::types::{Packument, SearchObject, SearchResponse};

/// Public npm registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
/// Largest page the search endpoint serves.
pub const PAGE_SIZE: usize = 250;
/// Default cap for [`NpmClient::search_by_scope`].
pub const DEFAULT_SCOPE_MAX_RESULTS: usize = 500;
/// Default number of concurrent registry requests.
pub const DEFAULT_CONCURRENCY: usize = 30;

const REGISTRY_USER_AGENT: &str = concat!("vite-plugin-registry/", env!("CARGO_PKG_VERSION"));

/// How a 404 is interpreted for a given endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    /// 404 means the package does not exist.
    Empty,
    /// 404 is an ordinary failure.
    Failure,
}

#[derive(Debug, Deserialize)]
struct LatestManifest {
    version: String,
}

/// Client for the npm registry API.
#[derive(Debug)]
pub struct NpmClient {
    http: Client,
    registry_url: Url,
    queue: RequestQueue,
    policy: RetryPolicy,
}

impl NpmClient {
    /// Create a client for the public registry with default limits.
    pub fn new() -> Result<Self> {
        Self::from_config(&RegistryConfig::default())
    }

    /// Create a client from the `registry` config section.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            registry_url: parse_base_url(&config.url)?,
            queue: RequestQueue::new(config.concurrency),
            policy: config.retry_policy(),
        })
    }

    /// Point the client at another registry (mirrors, test servers).
    pub fn with_registry_url(mut self, url: &str) -> Result<Self> {
        self.registry_url = parse_base_url(url)?;
        Ok(self)
    }

    /// Replace the retry timing.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The shared admission queue.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn registry_url(&self) -> &Url {
        &self.registry_url
    }

    /// Search packages tagged with `keyword`.
    ///
    /// Pages until a short page, the server-reported total, or `max_results`.
    pub async fn search_by_keyword(
        &self,
        keyword: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<SearchObject>> {
        let text = format!("keywords:{}", keyword);
        let results = self
            .paginate(&text, max_results.unwrap_or(usize::MAX), |_| true)
            .await?;
        info!(keyword, count = results.len(), "Keyword search finished");
        Ok(results)
    }

    /// Search packages whose name starts with `prefix` (e.g. `@rollup/plugin-`).
    ///
    /// The search endpoint matches text fuzzily, so hits are filtered on the
    /// name prefix. `max_results` defaults to 500.
    pub async fn search_by_scope(
        &self,
        prefix: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<SearchObject>> {
        let results = self
            .paginate(
                prefix,
                max_results.unwrap_or(DEFAULT_SCOPE_MAX_RESULTS),
                |obj| obj.name().starts_with(prefix),
            )
            .await?;
        info!(prefix, count = results.len(), "Scope search finished");
        Ok(results)
    }

    /// Fetch the packument of `name`. A 404 yields `Ok(None)`.
    pub async fn get_package(&self, name: &str) -> Result<Option<Packument>> {
        let url = self.package_url(name, None)?;
        let operation = format!("get package {}", name);
        let url_ref = &url;

        self.queue
            .run(retry(&self.policy, &self.queue, &operation, move || {
                self.attempt::<Packument>(url_ref, Missing::Empty)
            }))
            .await
    }

    /// Version tagged `latest` for `name`. Any failure yields `None`.
    pub async fn get_latest_version(&self, name: &str) -> Option<String> {
        let url = match self.package_url(name, Some("latest")) {
            Ok(url) => url,
            Err(e) => {
                warn!(package = name, error = %e, "Invalid package name");
                return None;
            }
        };

        let outcome = self
            .queue
            .run(async {
                Ok(self
                    .attempt::<LatestManifest>(&url, Missing::Empty)
                    .await)
            })
            .await;

        match outcome {
            Ok(Outcome::Ok(manifest)) => Some(manifest.version),
            Ok(Outcome::NotFound) => None,
            Ok(Outcome::RateLimited(e)) | Ok(Outcome::Transient(e)) | Err(e) => {
                warn!(package = name, error = %e, "Latest version lookup failed");
                None
            }
        }
    }

    /// Sequential pagination for one search text.
    async fn paginate<F>(
        &self,
        text: &str,
        max_results: usize,
        keep: F,
    ) -> Result<Vec<SearchObject>>
    where
        F: Fn(&SearchObject) -> bool,
    {
        let mut results = Vec::new();
        let mut retrieved = 0usize;
        let mut from = 0usize;

        while from < max_results {
            let page = self.search_page(text, from).await?;
            let page_len = page.objects.len();
            retrieved += page_len;
            results.extend(page.objects.into_iter().filter(|obj| keep(obj)));

            debug!(text, from, page_len, total = page.total, "Fetched search page");

            if page_len < PAGE_SIZE
                || retrieved as u64 >= page.total
                || results.len() >= max_results
            {
                break;
            }
            from += PAGE_SIZE;
        }

        results.truncate(max_results);
        Ok(results)
    }

    async fn search_page(&self, text: &str, from: usize) -> Result<SearchResponse> {
        let mut url = self.endpoint("-/v1/search")?;
        url.query_pairs_mut()
            .append_pair("text", text)
            .append_pair("size", &PAGE_SIZE.to_string())
            .append_pair("from", &from.to_string());

        let operation = format!("search {} (from={})", text, from);
        let url_ref = &url;

        self.queue
            .run(retry(&self.policy, &self.queue, &operation, move || {
                self.attempt::<SearchResponse>(url_ref, Missing::Failure)
            }))
            .await?
            .ok_or_else(|| RegistryError::NotFound(url.to_string()))
    }

    /// One HTTP round trip, classified by failure kind.
    async fn attempt<T: DeserializeOwned>(&self, url: &Url, missing: Missing) -> Outcome<T> {
        let response = match self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, REGISTRY_USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Outcome::Transient(e.into()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Outcome::RateLimited(status_error(status, url));
        }
        if status == StatusCode::NOT_FOUND && missing == Missing::Empty {
            return Outcome::NotFound;
        }
        if !status.is_success() {
            return Outcome::Transient(status_error(status, url));
        }

        match response.json::<T>().await {
            Ok(body) => Outcome::Ok(body),
            Err(e) => Outcome::Transient(e.into()),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.registry_url
            .join(path)
            .map_err(|e| RegistryError::Config(format!("Invalid registry path '{}': {}", path, e)))
    }

    /// `/<name>` or `/<name>/<suffix>`; the scope slash is percent-encoded.
    fn package_url(&self, name: &str, suffix: Option<&str>) -> Result<Url> {
        let encoded = name.replace('/', "%2f");
        match suffix {
            Some(suffix) => self.endpoint(&format!("{}/{}", encoded, suffix)),
            None => self.endpoint(&encoded),
        }
    }
}

fn status_error(status: StatusCode, url: &Url) -> RegistryError {
    RegistryError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    }
}

/// Parse a base URL, making sure relative joins append to its path.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| RegistryError::Config(format!("Invalid registry URL '{}': {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

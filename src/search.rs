use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};

/// Fixed third-party search endpoint.
pub const SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";
/// Fixed search engine identifier sent with every request.
pub const SEARCH_ENGINE: &str = "google_lens";
/// Value of the `type` parameter restricting results to exact matches.
pub const EXACT_MATCHES_TYPE: &str = "exact_matches";

/// Issues one reverse-image search and returns the raw response object.
#[async_trait]
pub trait ImageSearcher: Send + Sync {
    /// `exact_only` carries the already-resolved strict decision: global
    /// strict mode for queue-driven dispatch, always false for a forced
    /// broad retry.
    async fn search(
        &self,
        api_key: &str,
        image_url: &str,
        exact_only: bool,
    ) -> Result<Map<String, Value>>;
}

/// HTTP client for the third-party reverse-image-search API.
///
/// No request timeout is applied: a hung search stalls the queue until it
/// resolves or rejects, matching the pipeline's concurrency model.
pub struct SerpClient {
    client: Client,
    endpoint: String,
}

impl SerpClient {
    pub fn new() -> Self {
        Self::with_endpoint(SEARCH_ENDPOINT)
    }

    /// Point the client at a different endpoint, e.g. a local stub.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn build_request(
        &self,
        api_key: &str,
        image_url: &str,
        exact_only: bool,
    ) -> reqwest::Result<reqwest::Request> {
        let mut params = vec![
            ("api_key", api_key),
            ("engine", SEARCH_ENGINE),
            ("url", image_url),
        ];
        if exact_only {
            params.push(("type", EXACT_MATCHES_TYPE));
        }
        self.client.get(&self.endpoint).query(&params).build()
    }
}

impl Default for SerpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageSearcher for SerpClient {
    async fn search(
        &self,
        api_key: &str,
        image_url: &str,
        exact_only: bool,
    ) -> Result<Map<String, Value>> {
        let request = self
            .build_request(api_key, image_url, exact_only)
            .context("build search request")?;
        let response = self
            .client
            .execute(request)
            .await
            .context("search request failed")?;
        let body: Map<String, Value> = response
            .json()
            .await
            .context("search response was not a JSON object")?;
        Ok(body)
    }
}

/// Searcher that answers every request with an empty result object. Used by
/// dry runs where the pipeline shape matters but no credits should be spent.
#[derive(Debug, Default)]
pub struct NoopSearcher;

#[async_trait]
impl ImageSearcher for NoopSearcher {
    async fn search(
        &self,
        _api_key: &str,
        _image_url: &str,
        _exact_only: bool,
    ) -> Result<Map<String, Value>> {
        Ok(Map::new())
    }
}

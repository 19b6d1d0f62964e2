//! Knowledge-graph query client
//!
//! Resolves artist images by cross-referenced catalog identifier through a
//! public query endpoint that accepts a query string and returns tabular
//! JSON bindings. Unlike the catalog API this endpoint has no per-second
//! ceiling; callers pace themselves with small batches and a pause between
//! them (see the image refresher).

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::services::refresher::ImageResolver;
use async_trait::async_trait;
use tunelog_common::{Error, Result};

/// Tabular query response: `results.bindings` is a list of rows mapping
/// variable names to typed values
#[derive(Debug, Deserialize)]
struct BindingsResponse {
    results: BindingsResults,
}

#[derive(Debug, Deserialize)]
struct BindingsResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, BoundValue>>,
}

#[derive(Debug, Deserialize)]
struct BoundValue {
    value: String,
}

/// Knowledge-graph query client
pub struct KnowledgeGraphClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl KnowledgeGraphClient {
    /// Create a new client with the shared Tunelog User-Agent
    pub fn new(user_agent: String, endpoint: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    /// Run a query and flatten each binding row to `variable -> value`
    pub async fn query_bindings(&self, query: &str) -> Result<Vec<HashMap<String, String>>> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("query", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Knowledge-graph request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "Knowledge-graph endpoint returned status {}",
                status
            )));
        }

        let parsed: BindingsResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse bindings response: {}", e)))?;

        Ok(parsed
            .results
            .bindings
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k, v.value)).collect())
            .collect())
    }

    /// Resolve an artist's image URL by catalog identifier.
    ///
    /// Returns `Ok(None)` when the graph knows the artist but has no image,
    /// or does not know the artist at all.
    pub async fn artist_image(&self, artist_mbid: &str) -> Result<Option<String>> {
        // Identifiers are interpolated into the query string; only plain
        // catalog ids are accepted.
        if !artist_mbid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(Error::InvalidInput(format!(
                "Invalid artist identifier: {}",
                artist_mbid
            )));
        }

        let query = artist_image_query(artist_mbid);
        let rows = self.query_bindings(&query).await?;

        let image = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("image"));

        debug!(
            artist_mbid = %artist_mbid,
            found = image.is_some(),
            "Resolved artist image from knowledge graph"
        );

        Ok(image)
    }
}

/// Query for an artist's image by catalog identifier (P434: catalog artist
/// id, P18: image)
fn artist_image_query(artist_mbid: &str) -> String {
    format!(
        "SELECT ?image WHERE {{ ?item wdt:P434 \"{}\" . ?item wdt:P18 ?image . }} LIMIT 1",
        artist_mbid
    )
}

#[async_trait]
impl ImageResolver for KnowledgeGraphClient {
    async fn resolve_artist_image(&self, artist_mbid: &str) -> Result<Option<String>> {
        self.artist_image(artist_mbid).await
    }
}

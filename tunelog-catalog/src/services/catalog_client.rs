//! External music catalog API client
//!
//! The catalog enforces roughly one request per second per client and
//! requires a contact-bearing User-Agent on every request. All requests go
//! through a token-bucket rate limiter with burst 1, so no two request
//! starts are closer than the configured minimum interval.

use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::services::refresher::ReleaseFetcher;
use crate::services::status_filter::StatusFetcher;
use async_trait::async_trait;
use tunelog_common::{Error, Result};

/// Page size for paginated browse requests
pub const PAGE_SIZE: usize = 100;

/// A release group (album-level grouping) from the external catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseGroup {
    pub id: String,
    pub title: String,
    #[serde(rename = "first-release-date", default)]
    pub first_release_date: Option<String>,
    #[serde(rename = "primary-type", default)]
    pub primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    pub secondary_types: Vec<String>,
}

/// One page of a release-group browse response
#[derive(Debug, Deserialize)]
struct ReleaseGroupPage {
    #[serde(rename = "release-groups", default)]
    release_groups: Vec<ReleaseGroup>,
}

/// Release-group lookup response with its releases
#[derive(Debug, Deserialize)]
struct ReleaseGroupLookup {
    #[serde(default)]
    releases: Vec<ReleaseInfo>,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    #[serde(default)]
    status: Option<String>,
}

/// Fetch a paginated resource page by page until a short page signals the
/// end, concatenating all items. Offsets advance by `page_size`.
pub(crate) async fn fetch_all_pages<T, F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch_page(offset).await?;
        let page_len = page.len();
        all.extend(page);

        if page_len < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(all)
}

/// Rate-limited external catalog client
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    /// Token bucket with burst 1: enforces the minimum interval between
    /// request starts
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl CatalogClient {
    /// Minimum interval between request starts: slightly above the
    /// catalog's published 1 request/second limit.
    pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1100);

    /// Create a new client.
    ///
    /// `user_agent` must carry a contact (the catalog rejects anonymous
    /// clients); `min_interval` must be non-zero.
    pub fn new(user_agent: String, base_url: String, min_interval: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let quota = Quota::with_period(min_interval)
            .ok_or_else(|| Error::Config("Catalog request interval must be non-zero".to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Fetch all release groups for an artist.
    ///
    /// Browses the paginated release-group resource with `limit`/`offset`
    /// until the catalog returns a short page. Each page request waits for
    /// a rate-limiter permit.
    pub async fn browse_release_groups(&self, artist_mbid: &str) -> Result<Vec<ReleaseGroup>> {
        let groups = fetch_all_pages(PAGE_SIZE, |offset| {
            self.fetch_release_group_page(artist_mbid, offset)
        })
        .await?;

        debug!(
            artist_mbid = %artist_mbid,
            count = groups.len(),
            "Fetched release groups from catalog"
        );

        Ok(groups)
    }

    async fn fetch_release_group_page(
        &self,
        artist_mbid: &str,
        offset: usize,
    ) -> Result<Vec<ReleaseGroup>> {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/release-group?artist={}&limit={}&offset={}&fmt=json",
            self.base_url, artist_mbid, PAGE_SIZE, offset
        );

        debug!(artist_mbid = %artist_mbid, offset = offset, "Querying catalog API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Catalog request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "Catalog returned status {} for artist {}",
                status, artist_mbid
            )));
        }

        let page: ReleaseGroupPage = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse catalog response: {}", e)))?;

        Ok(page.release_groups)
    }

    /// Whether a release group has at least one official release
    pub async fn release_group_status(&self, release_group_mbid: &str) -> Result<bool> {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/release-group/{}?inc=releases&fmt=json",
            self.base_url, release_group_mbid
        );

        debug!(release_group_mbid = %release_group_mbid, "Querying catalog for release status");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Catalog request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "Catalog returned status {} for release group {}",
                status, release_group_mbid
            )));
        }

        let lookup: ReleaseGroupLookup = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse catalog response: {}", e)))?;

        Ok(lookup
            .releases
            .iter()
            .any(|r| r.status.as_deref() == Some("Official")))
    }
}

#[async_trait]
impl ReleaseFetcher for CatalogClient {
    async fn fetch_release_groups(&self, artist_mbid: &str) -> Result<Vec<ReleaseGroup>> {
        self.browse_release_groups(artist_mbid).await
    }
}

#[async_trait]
impl StatusFetcher for CatalogClient {
    async fn fetch_official_status(&self, release_group_mbid: &str) -> Result<bool> {
        self.release_group_status(release_group_mbid).await
    }
}

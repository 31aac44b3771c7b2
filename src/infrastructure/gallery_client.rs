//! HTTP implementation of the remote gallery API read contract.
//!
//! Short-lived JSON requests with a bearer token. There is no retry or
//! backoff layer: a failed remote call surfaces immediately and only the
//! Stage 3 batch loop tolerates it, per case.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::gallery::{CaseIdPage, CasePayload, CategoryTree, GalleryClient};
use crate::infrastructure::config::GalleryConfig;

#[derive(Clone, Debug)]
pub struct HttpGalleryClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpGalleryClient {
    pub fn new(config: &GalleryConfig) -> SyncResult<Self> {
        if config.api_token.trim().is_empty() {
            return Err(SyncError::Configuration("gallery API token is not set".to_string()));
        }
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            SyncError::Configuration(format!(
                "invalid gallery API base URL '{}': {e}",
                config.api_base_url
            ))
        })?;
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .gzip(true)
            .user_agent(concat!("case-gallery-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url, token: config.api_token.clone() })
    }

    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                SyncError::Configuration("gallery API base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> SyncResult<T> {
        debug!("🌐 GET {url}");
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::Connectivity(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Configuration(format!(
                "gallery API rejected credentials ({status}) for {url}"
            )));
        }
        if !status.is_success() {
            warn!("❌ HTTP {status} from {url}");
            return Err(SyncError::Connectivity(format!("HTTP {status} from {url}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Validation(format!("malformed response from {url}: {e}")))
    }
}

#[async_trait]
impl GalleryClient for HttpGalleryClient {
    async fn fetch_categories(&self) -> SyncResult<CategoryTree> {
        let url = self.endpoint(&["categories"])?;
        self.get_json(url).await
    }

    async fn fetch_case_ids(&self, procedure_id: &str, page: u32) -> SyncResult<CaseIdPage> {
        let mut url = self.endpoint(&["procedures", procedure_id, "case-ids"])?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        self.get_json(url).await
    }

    async fn fetch_case(&self, case_id: &str) -> SyncResult<CasePayload> {
        let url = self.endpoint(&["cases", case_id])?;
        self.get_json(url).await
    }

    async fn fetch_image(&self, image_url: &str) -> SyncResult<Vec<u8>> {
        let url = Url::parse(image_url)
            .map_err(|e| SyncError::Validation(format!("invalid image URL '{image_url}': {e}")))?;
        debug!("🌐 GET (image) {url}");
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::Connectivity(format!("image request to {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SyncError::Connectivity(format!(
                "HTTP {} fetching image {url}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Connectivity(format!("reading image body from {url}: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn track_view(&self, case_id: &str) -> SyncResult<()> {
        let url = self.endpoint(&["cases", case_id, "views"])?;
        debug!("🌐 POST {url}");
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::Connectivity(format!("request to {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SyncError::Connectivity(format!("HTTP {} from {url}", response.status())));
        }
        Ok(())
    }

    async fn health_check(&self) -> SyncResult<()> {
        // The sidebar fetch doubles as the connectivity probe; it is the
        // cheapest authenticated read the API offers.
        self.fetch_categories().await.map(|_| ())
    }
}

//! PikPak drive metadata API
//!
//! List, fetch and trash calls against `/drive/v1/files`. Every call goes
//! through the drive pipeline, so each carries a fresh captcha proof for its
//! own action. Nothing here retries or caches.

use bridge_traits::http::{HttpRequest, HttpResponse};
use core_runtime::config::DriveConfig;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{PikPakError, Result};
use crate::pipeline::ClientPipeline;
use crate::types::{DownloadDescriptor, RemoteItem, RemoteListing, TrashRequest};

/// Only non-trashed, fully uploaded items are listed
const LIST_FILTER: &str = r#"{"trashed":{"eq":false},"phase":{"eq":"PHASE_TYPE_COMPLETE"}}"#;

/// Page size; folders are read in a single page
const LIST_LIMIT: u32 = 1000;

/// Drive metadata API
pub struct DriveApi {
    pipeline: ClientPipeline,
    base_url: String,
    timeout: Duration,
}

impl DriveApi {
    pub fn new(pipeline: ClientPipeline, config: &DriveConfig) -> Self {
        Self {
            pipeline,
            base_url: config.drive_api_base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v1/files", self.base_url)
    }

    fn list_url(&self, parent_id: &str) -> String {
        format!(
            "{}?thumbnail_size=SIZE_MEDIUM&limit={}&parent_id={}&with_audit=true&filters={}",
            self.files_url(),
            LIST_LIMIT,
            urlencoding::encode(parent_id),
            urlencoding::encode(LIST_FILTER)
        )
    }

    /// List the children of a folder-like item
    ///
    /// # Errors
    ///
    /// [`PikPakError::NotAFolder`] without any remote call when `item` is
    /// not folder-like.
    #[instrument(skip(self, item), fields(id = %item.id, name = %item.name))]
    pub async fn list(&self, item: &RemoteItem) -> Result<RemoteListing> {
        if !item.is_folder() {
            return Err(PikPakError::NotAFolder(item.name.clone()));
        }

        let url = self.list_url(&item.id);
        let response = self
            .pipeline
            .send(HttpRequest::get(&url).timeout(self.timeout))
            .await?;
        let listing: RemoteListing = parse_ok(&url, response)?;

        debug!(entries = listing.len(), "Listed folder");
        Ok(listing)
    }

    /// Fetch the download descriptor of an item
    #[instrument(skip(self, item), fields(id = %item.id))]
    pub async fn fetch(&self, item: &RemoteItem) -> Result<DownloadDescriptor> {
        let url = format!(
            "{}/{}?usage=FETCH",
            self.files_url(),
            urlencoding::encode(&item.id)
        );
        let response = self
            .pipeline
            .send(HttpRequest::get(&url).timeout(self.timeout))
            .await?;
        parse_ok(&url, response)
    }

    /// Move an item to the trash
    #[instrument(skip(self, item), fields(id = %item.id, name = %item.name))]
    pub async fn trash(&self, item: &RemoteItem) -> Result<()> {
        let url = format!("{}:batchTrash", self.files_url());
        let request = HttpRequest::post(&url)
            .json(&TrashRequest { ids: [item.id.as_str()] })?
            .timeout(self.timeout);

        let response = self.pipeline.send(request).await?;
        ensure_ok(&url, &response)?;

        info!("Moved item to trash");
        Ok(())
    }
}

fn ensure_ok(url: &str, response: &HttpResponse) -> Result<()> {
    if response.status != 200 {
        return Err(PikPakError::UnexpectedStatus {
            endpoint: url.to_string(),
            status: response.status,
            body: response.text_lossy(),
        });
    }
    Ok(())
}

fn parse_ok<T: DeserializeOwned>(url: &str, response: HttpResponse) -> Result<T> {
    ensure_ok(url, &response)?;
    serde_json::from_slice(&response.body).map_err(|e| PikPakError::ParseError(e.to_string()))
}

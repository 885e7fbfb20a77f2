//! # Direct Download
//!
//! Fast path for plain GET requests on files: the resolved file's
//! pre-signed URL is fetched with the caller's own headers and the upstream
//! response is handed back as-is, so range handling stays with the download
//! host. The only rewrite is a 503 from the host, which becomes a 429 with
//! a `Retry-After` hint after a short pause.
//!
//! The path has its own slot semaphore, sized like the download client's,
//! and a slot stays taken until the proxied body is dropped.

use bridge_traits::http::{HttpRequest, StreamingResponse};
use provider_pikpak::download::hold_until_dropped;
use provider_pikpak::DownloadClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::error::{FsError, Result};
use crate::path;
use crate::tree::RemoteTree;

pub struct DirectDownload {
    tree: Arc<RemoteTree>,
    downloads: Arc<DownloadClient>,
    slots: Arc<Semaphore>,
    retry_after: Duration,
    pause: Duration,
}

impl DirectDownload {
    pub fn new(
        tree: Arc<RemoteTree>,
        downloads: Arc<DownloadClient>,
        max_connections: usize,
        retry_after: Duration,
        pause: Duration,
    ) -> Self {
        Self {
            tree,
            downloads,
            slots: Arc::new(Semaphore::new(max_connections)),
            retry_after,
            pause,
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Proxy the content of the file at `path`
    ///
    /// `headers` are the inbound request headers; everything but `Host` is
    /// forwarded upstream.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotExist`] when nothing is at `path`
    /// - [`FsError::NotFound`] when `path` is a folder
    #[instrument(skip(self, headers))]
    pub async fn serve(&self, path: &str, headers: &HashMap<String, String>) -> Result<StreamingResponse> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| FsError::Cancelled)?;

        let key = path::normalize(path);
        let item = self
            .tree
            .lookup(&key)
            .await?
            .ok_or_else(|| FsError::NotExist(key.clone()))?;
        if item.is_folder() {
            return Err(FsError::NotFound(format!("{} is not a file", key)));
        }

        let descriptor = self.tree.fetch(&item).await?;
        let mut request = HttpRequest::get(descriptor.web_content_link.as_str());
        for (name, value) in headers {
            if !name.eq_ignore_ascii_case("host") {
                request.set_header(name.as_str(), value.as_str());
            }
        }

        let response = self.downloads.forward(request).await?;
        if response.status == 503 {
            let body = response.into_bytes().await.unwrap_or_default();
            warn!(path = %key, "Download host returned 503, answering 429");
            tokio::time::sleep(self.pause).await;
            return Ok(self.rate_limited(body));
        }

        info!(path = %key, status = response.status, "Proxying download");
        Ok(hold_until_dropped(response, permit))
    }

    fn rate_limited(&self, body: bytes::Bytes) -> StreamingResponse {
        let mut headers = HashMap::new();
        headers.insert(
            "Retry-After".to_string(),
            self.retry_after.as_secs().to_string(),
        );
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        StreamingResponse::from_bytes(429, headers, body)
    }
}

//! # Stream File
//!
//! Per-open handle over one remote item.
//!
//! Opening a handle performs no I/O. The first `read` on a file resolves the
//! download descriptor and issues a ranged GET from the logical cursor to
//! the end of the file; later reads drain that body. Seeking only moves the
//! cursor and drops the open body, so the next read reconnects at the new
//! offset.
//!
//! Reads and seeks on one handle are serialized by the handle's own lock.
//! `close` cancels the handle's token first, which unblocks a read waiting
//! on a download slot or a chunk, then releases the body.

use async_trait::async_trait;
use bridge_traits::ByteStream;
use bytes::Bytes;
use futures::StreamExt;
use provider_pikpak::{ByteRange, DownloadClient, PikPakError, RemoteItem};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{FsError, Result};
use crate::filesystem::File;
use crate::tree::{FileInfo, RemoteTree};

#[derive(Default)]
struct StreamState {
    cursor: u64,
    body: Option<ByteStream>,
    /// Bytes received but not yet handed to a caller
    pending: Bytes,
    dir_cursor: usize,
}

impl StreamState {
    fn close_body(&mut self) {
        self.body = None;
        self.pending = Bytes::new();
    }
}

/// Open handle on a remote file or folder
pub struct StreamFile {
    item: RemoteItem,
    info: FileInfo,
    tree: Arc<RemoteTree>,
    downloads: Arc<DownloadClient>,
    retry_after: Duration,
    pause: Duration,
    cancel: CancellationToken,
    state: Mutex<StreamState>,
}

impl StreamFile {
    pub fn new(
        item: RemoteItem,
        tree: Arc<RemoteTree>,
        downloads: Arc<DownloadClient>,
        retry_after: Duration,
        pause: Duration,
    ) -> Self {
        let info = FileInfo::from_item(&item);
        Self {
            item,
            info,
            tree,
            downloads,
            retry_after,
            pause,
            cancel: CancellationToken::new(),
            state: Mutex::new(StreamState::default()),
        }
    }

    pub fn item(&self) -> &RemoteItem {
        &self.item
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Current logical read position
    pub async fn position(&self) -> u64 {
        self.state.lock().await.cursor
    }

    /// Whether a response body is currently open
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.body.is_some()
    }

    /// Ranged body from `start` to the last byte
    ///
    /// A 4xx on the pre-signed URL usually means the link expired before
    /// the cached descriptor did, so the descriptor is dropped and fetched
    /// again once.
    async fn open_body(&self, start: u64) -> Result<ByteStream> {
        let range = ByteRange::new(start, self.info.size - 1);
        let mut refetched = false;

        loop {
            let descriptor = self.tree.fetch(&self.item).await?;
            match self
                .downloads
                .get_range(&descriptor.web_content_link, range)
                .await
            {
                Ok(response) => return Ok(response.body),
                Err(PikPakError::ServiceUnavailable { body }) => {
                    warn!(id = %self.item.id, "Download rate limited, pausing");
                    tokio::time::sleep(self.pause).await;
                    return Err(FsError::TooManyRequests {
                        retry_after: self.retry_after,
                        body,
                    });
                }
                Err(PikPakError::UnexpectedStatus { status, .. })
                    if (400..500).contains(&status) && !refetched =>
                {
                    debug!(id = %self.item.id, status, "Download link rejected, refetching");
                    self.tree.invalidate_descriptor(&self.item);
                    refetched = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read up to `buf.len()` bytes at the cursor
    ///
    /// Returns `Ok(0)` at end of file without any I/O, however often it is
    /// called.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidOperation`] on a folder
    /// - [`FsError::TooManyRequests`] when the download host answered 503
    /// - [`FsError::RangeMismatch`] when the host ignored the range or the
    ///   body ended before the declared size
    /// - [`FsError::Cancelled`] once the handle is closed
    #[instrument(skip(self, buf), fields(id = %self.item.id, len = buf.len()))]
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.info.is_dir {
            return Err(FsError::InvalidOperation(format!(
                "{} is a folder",
                self.info.name
            )));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.cursor >= self.info.size {
            state.close_body();
            return Ok(0);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.cancel.is_cancelled() {
            return Err(FsError::Cancelled);
        }

        if state.body.is_none() {
            let body = tokio::select! {
                _ = self.cancel.cancelled() => return Err(FsError::Cancelled),
                opened = self.open_body(state.cursor) => opened?,
            };
            state.body = Some(body);
        }

        let remaining = self.info.size - state.cursor;
        let wanted = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));

        if state.pending.is_empty() {
            let next = match state.body.as_mut() {
                Some(body) => tokio::select! {
                    _ = self.cancel.cancelled() => return Err(FsError::Cancelled),
                    next = body.next() => next,
                },
                None => None,
            };

            match next {
                Some(Ok(chunk)) => state.pending = chunk,
                Some(Err(e)) => {
                    state.close_body();
                    return Err(e.into());
                }
                None => {
                    state.close_body();
                    return Err(FsError::RangeMismatch {
                        expected: format!("bytes {}-{}", state.cursor, self.info.size - 1),
                        actual: "body ended early".to_string(),
                    });
                }
            }
        }

        let n = wanted.min(state.pending.len());
        let chunk = state.pending.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        state.cursor += n as u64;
        Ok(n)
    }

    /// Move the cursor without any I/O
    ///
    /// A seek to the current position keeps the open body; any other target
    /// drops it.
    pub async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        if self.info.is_dir {
            return Err(FsError::InvalidOperation(format!(
                "cannot seek in folder {}",
                self.info.name
            )));
        }

        let mut state = self.state.lock().await;
        let target: i128 = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(state.cursor) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.info.size) + i128::from(delta),
        };
        let target = u64::try_from(target)
            .map_err(|_| FsError::InvalidOperation(format!("invalid seek target {}", target)))?;

        if target != state.cursor {
            state.cursor = target;
            state.close_body();
        }
        Ok(target)
    }

    /// Next page of a folder's entries; see [`RemoteTree::readdir`]
    pub async fn readdir(&self, count: i64) -> Result<Vec<FileInfo>> {
        let mut state = self.state.lock().await;
        self.tree
            .readdir(&self.item, &mut state.dir_cursor, count)
            .await
    }

    /// Release the body and cancel in-flight work; safe to call repeatedly
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        self.state.lock().await.close_body();
        Ok(())
    }
}

#[async_trait]
impl File for StreamFile {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        StreamFile::read(self, buf).await
    }

    async fn seek(&self, pos: SeekFrom) -> Result<u64> {
        StreamFile::seek(self, pos).await
    }

    async fn readdir(&self, count: i64) -> Result<Vec<FileInfo>> {
        StreamFile::readdir(self, count).await
    }

    async fn stat(&self) -> Result<FileInfo> {
        Ok(self.info.clone())
    }

    async fn write(&self, _buf: &[u8]) -> Result<usize> {
        Err(FsError::PermissionDenied(format!(
            "{} is read-only",
            self.info.name
        )))
    }

    async fn close(&self) -> Result<()> {
        StreamFile::close(self).await
    }
}

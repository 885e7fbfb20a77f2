//! # FileSystem Surface
//!
//! The capability set a filesystem-protocol server drives: open, stat,
//! delete and directory listing. The tree is read-only, so every operation
//! that would create or rename something is refused with
//! [`FsError::PermissionDenied`].

use async_trait::async_trait;
use provider_pikpak::DownloadClient;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::error::{FsError, Result};
use crate::path;
use crate::stream::StreamFile;
use crate::tree::{FileInfo, RemoteTree};

/// Open flags a protocol server may pass to [`FileSystem::open_file`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
}

impl OpenOptions {
    pub fn read_only() -> Self {
        Self::default()
    }

    fn mutates(&self) -> bool {
        self.write || self.create || self.truncate
    }
}

/// Open handle as seen by a protocol server
#[async_trait]
pub trait File: Send + Sync {
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    async fn seek(&self, pos: SeekFrom) -> Result<u64>;

    /// Next `count` entries of a folder; `count <= 0` returns all remaining
    async fn readdir(&self, count: i64) -> Result<Vec<FileInfo>>;

    async fn stat(&self) -> Result<FileInfo>;

    async fn write(&self, buf: &[u8]) -> Result<usize>;

    async fn close(&self) -> Result<()>;
}

/// Filesystem operations driven by a protocol server
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn open_file(&self, path: &str, options: OpenOptions) -> Result<Box<dyn File>>;

    async fn stat(&self, path: &str) -> Result<FileInfo>;

    async fn remove_all(&self, path: &str) -> Result<()>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    async fn rename(&self, from: &str, to: &str) -> Result<()>;
}

/// Read-only [`FileSystem`] over one drive session
pub struct DriveFileSystem {
    tree: Arc<RemoteTree>,
    downloads: Arc<DownloadClient>,
    retry_after: Duration,
    pause: Duration,
}

impl DriveFileSystem {
    pub fn new(
        tree: Arc<RemoteTree>,
        downloads: Arc<DownloadClient>,
        retry_after: Duration,
        pause: Duration,
    ) -> Self {
        Self {
            tree,
            downloads,
            retry_after,
            pause,
        }
    }

    /// Open `path` for reading without any download I/O
    ///
    /// # Errors
    ///
    /// [`FsError::NotExist`] when nothing is at `path`.
    #[instrument(skip(self))]
    pub async fn open(&self, path: &str) -> Result<StreamFile> {
        let key = path::normalize(path);
        let item = self
            .tree
            .lookup(&key)
            .await?
            .ok_or(FsError::NotExist(key))?;

        Ok(StreamFile::new(
            item,
            Arc::clone(&self.tree),
            Arc::clone(&self.downloads),
            self.retry_after,
            self.pause,
        ))
    }

    /// Every entry of the folder at `path`
    pub async fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let item = self.tree.resolve(path).await?;
        let mut cursor = 0;
        self.tree.readdir(&item, &mut cursor, 0).await
    }

    pub fn tree(&self) -> &Arc<RemoteTree> {
        &self.tree
    }
}

fn read_only(op: &str, path: &str) -> FsError {
    FsError::PermissionDenied(format!("{} {}: drive is read-only", op, path))
}

#[async_trait]
impl FileSystem for DriveFileSystem {
    async fn open_file(&self, path: &str, options: OpenOptions) -> Result<Box<dyn File>> {
        if options.mutates() {
            return Err(read_only("open", path));
        }
        Ok(Box::new(self.open(path).await?))
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        self.tree.stat(path).await
    }

    async fn remove_all(&self, path: &str) -> Result<()> {
        self.tree.delete(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        Err(read_only("mkdir", path))
    }

    async fn rename(&self, from: &str, _to: &str) -> Result<()> {
        Err(read_only("rename", from))
    }
}

//! # Remote Tree
//!
//! Path resolution over the drive's id-addressed API.
//!
//! ## Overview
//!
//! The service only knows item ids and parent ids, so a path is resolved by
//! walking down from the root one listing at a time. Three TTL caches keep
//! the walk cheap:
//!
//! - items: normalized path to item, or a tombstone for a known-absent path
//! - listings: folder id to its children
//! - descriptors: file id to its download descriptor
//!
//! Every prefix visited during a walk is cached before the walk descends, so
//! an entry is never cached before its ancestors were confirmed to exist and
//! be folder-like.
//!
//! ## Invalidation
//!
//! A delete purges the deleted path and everything below it, the id-keyed
//! entries of the deleted item and the parent's listing, then writes a
//! tombstone. The three caches are purged one after another, not atomically.

use chrono::{DateTime, Utc};
use core_runtime::config::DriveConfig;
use provider_pikpak::{DownloadDescriptor, DriveApi, RemoteItem, RemoteListing};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::cache::TtlCache;
use crate::error::{FsError, Result};
use crate::path;

/// Mode bits reported for folders
pub const FOLDER_MODE: u32 = 0o777;
/// Mode bits reported for files
pub const FILE_MODE: u32 = 0o444;

/// Metadata view of a remote item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    /// Permission bits; see [`FOLDER_MODE`] and [`FILE_MODE`]
    pub mode: u32,
    pub modified: DateTime<Utc>,
}

impl FileInfo {
    pub fn from_item(item: &RemoteItem) -> Self {
        let is_dir = item.is_folder();
        Self {
            name: item.name.clone(),
            size: item.size_bytes(),
            is_dir,
            mode: if is_dir { FOLDER_MODE } else { FILE_MODE },
            modified: DateTime::parse_from_rfc3339(&item.modified_time)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

/// Cached view of one drive's folder tree
pub struct RemoteTree {
    api: Arc<DriveApi>,
    items: TtlCache<String, Option<RemoteItem>>,
    listings: TtlCache<String, Arc<RemoteListing>>,
    descriptors: TtlCache<String, Arc<DownloadDescriptor>>,
    /// One lock per item id, so concurrent readers of a file share one
    /// descriptor call without waiting on other files
    fetch_locks: TtlCache<String, Arc<Mutex<()>>>,
}

impl RemoteTree {
    pub fn new(api: Arc<DriveApi>, config: &DriveConfig) -> Self {
        Self {
            api,
            items: TtlCache::new(config.item_cache_ttl),
            listings: TtlCache::new(config.listing_cache_ttl),
            descriptors: TtlCache::new(config.download_cache_ttl),
            fetch_locks: TtlCache::new(config.download_cache_ttl),
        }
    }

    /// Resolve `path`, failing with [`FsError::NotFound`] when it is absent
    pub async fn resolve(&self, path: &str) -> Result<RemoteItem> {
        let key = path::normalize(path);
        self.lookup_normalized(&key)
            .await?
            .ok_or(FsError::NotFound(key))
    }

    /// Resolve `path`, reporting absence as `None`
    ///
    /// # Errors
    ///
    /// [`FsError::NotAFolder`] when an intermediate segment is a file.
    pub async fn lookup(&self, path: &str) -> Result<Option<RemoteItem>> {
        self.lookup_normalized(&path::normalize(path)).await
    }

    #[instrument(skip(self))]
    async fn lookup_normalized(&self, target: &str) -> Result<Option<RemoteItem>> {
        if let Some(cached) = self.items.get(target) {
            return Ok(cached);
        }

        let mut current_path = String::new();
        let mut current = RemoteItem::root();
        self.items.insert(current_path.clone(), Some(current.clone()));

        let segments: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
        for segment in segments {
            if !current.is_folder() {
                return Err(FsError::NotAFolder(current_path));
            }

            let next_path = path::join(&current_path, segment);
            let next = match self.items.get(&next_path) {
                Some(Some(item)) => item,
                Some(None) => return Ok(None),
                None => {
                    let listing = self.list(&current).await?;
                    match listing.get(segment) {
                        Some(item) => item.clone(),
                        None => {
                            debug!(path = %next_path, "Caching tombstone");
                            self.items.insert(next_path, None);
                            return Ok(None);
                        }
                    }
                }
            };

            self.items.insert(next_path.clone(), Some(next.clone()));
            current_path = next_path;
            current = next;
        }

        Ok(Some(current))
    }

    /// Children of a folder-like item
    pub async fn list(&self, item: &RemoteItem) -> Result<Arc<RemoteListing>> {
        if !item.is_folder() {
            return Err(FsError::NotAFolder(item.name.clone()));
        }
        if let Some(listing) = self.listings.get(&item.id) {
            return Ok(listing);
        }

        let listing = Arc::new(self.api.list(item).await?);
        self.listings.insert(item.id.clone(), Arc::clone(&listing));
        Ok(listing)
    }

    /// Download descriptor of an item
    pub async fn fetch(&self, item: &RemoteItem) -> Result<Arc<DownloadDescriptor>> {
        let lock = self
            .fetch_locks
            .get_or_insert_with(item.id.clone(), || Arc::new(Mutex::new(())));
        let _guard = lock.lock().await;
        if let Some(descriptor) = self.descriptors.get(&item.id) {
            return Ok(descriptor);
        }

        let descriptor = Arc::new(self.api.fetch(item).await?);
        self.descriptors.insert(item.id.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Forget a cached descriptor, e.g. after its URL was rejected
    pub fn invalidate_descriptor(&self, item: &RemoteItem) {
        self.descriptors.remove(&item.id);
    }

    /// Metadata for `path`, failing with [`FsError::NotExist`] when absent
    pub async fn stat(&self, path: &str) -> Result<FileInfo> {
        let key = path::normalize(path);
        match self.lookup_normalized(&key).await? {
            Some(item) => Ok(FileInfo::from_item(&item)),
            None => Err(FsError::NotExist(key)),
        }
    }

    /// Page through the children of `item`
    ///
    /// `cursor` is advanced past the returned entries. A `count` of zero or
    /// less, or larger than what remains, returns everything remaining.
    pub async fn readdir(&self, item: &RemoteItem, cursor: &mut usize, count: i64) -> Result<Vec<FileInfo>> {
        let listing = self.list(item).await?;
        let start = (*cursor).min(listing.files.len());
        let remaining = listing.files.len() - start;

        let take = match usize::try_from(count) {
            Ok(n) if n > 0 && n <= remaining => n,
            _ => remaining,
        };

        let page = listing.files[start..start + take]
            .iter()
            .map(FileInfo::from_item)
            .collect();
        *cursor = start + take;
        Ok(page)
    }

    /// Move the item at `path` to the trash
    ///
    /// Caches are purged only after the remote call succeeded.
    ///
    /// # Errors
    ///
    /// - [`FsError::PermissionDenied`] for the root
    /// - [`FsError::NotExist`] when nothing is at `path`
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        let key = path::normalize(path);
        if key.is_empty() {
            return Err(FsError::PermissionDenied("cannot delete the root".to_string()));
        }

        let item = self
            .lookup_normalized(&key)
            .await?
            .ok_or_else(|| FsError::NotExist(key.clone()))?;

        self.api.trash(&item).await?;

        let purged = self.items.remove_subtree(&key);
        self.listings.remove(&item.id);
        self.descriptors.remove(&item.id);
        self.listings.remove(&item.parent_id);
        if let Some(Some(parent)) = self.items.get(path::parent(&key)) {
            self.listings.remove(&parent.id);
        }
        self.items.insert(key.clone(), None);

        info!(path = %key, purged, "Deleted item");
        Ok(())
    }
}

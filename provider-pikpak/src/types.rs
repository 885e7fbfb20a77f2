//! PikPak drive API response types
//!
//! Data structures for deserializing `/drive/v1/files` responses. Values are
//! plain snapshots; nothing here holds a handle back to the client.

use serde::{Deserialize, Serialize};

/// Kind of the synthetic root folder.
pub const ROOT_KIND: &str = "drive#folder";

/// Drive file or folder resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Capability tag, e.g. `drive#file` or `drive#folder`
    #[serde(default)]
    pub kind: String,

    /// Item ID; empty for the root
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub parent_id: String,

    #[serde(default)]
    pub name: String,

    /// Size in bytes as a decimal string
    #[serde(default)]
    pub size: String,

    /// Creation time (RFC 3339)
    #[serde(default)]
    pub created_time: String,

    /// Modification time (RFC 3339)
    #[serde(default)]
    pub modified_time: String,
}

impl RemoteItem {
    /// The drive root. It is never fetched; listing it uses an empty parent id.
    pub fn root() -> Self {
        Self {
            kind: ROOT_KIND.to_string(),
            ..Self::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.id.is_empty()
    }

    /// Folder-like items can be listed. Hybrid kinds may also be file-like.
    pub fn is_folder(&self) -> bool {
        self.kind.contains("folder") || self.kind.contains("fileList")
    }

    pub fn is_file(&self) -> bool {
        self.kind.contains("file")
    }

    /// Declared size; unparseable or missing sizes count as empty
    pub fn size_bytes(&self) -> u64 {
        self.size.parse().unwrap_or(0)
    }
}

/// Folder listing, in the order the service returned it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListing {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub files: Vec<RemoteItem>,
}

impl RemoteListing {
    /// First child named exactly `name`
    pub fn get(&self, name: &str) -> Option<&RemoteItem> {
        self.files.iter().find(|item| item.name == name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// `usage=FETCH` response carrying the pre-signed download URL
///
/// The URL expires on the service's schedule, independent of any local
/// cache lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub files: Vec<RemoteItem>,

    #[serde(default)]
    pub web_content_link: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TrashRequest<'a> {
    pub ids: [&'a str; 1],
}

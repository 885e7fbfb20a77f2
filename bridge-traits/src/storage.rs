//! Document Storage Abstraction
//!
//! Session state and account configuration are persisted as small named
//! documents. The core serializes them; a store only moves bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Named-document load/save seam
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StateStore;
///
/// async fn remember(store: &dyn StateStore, json: Vec<u8>) -> Result<()> {
///     store.save("state", json.into()).await
/// }
/// ```
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load a document, returning `None` when it was never saved
    async fn load(&self, name: &str) -> Result<Option<Bytes>>;

    /// Replace a document
    async fn save(&self, name: &str, contents: Bytes) -> Result<()>;
}

//! JSON document store backed by a directory

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::StateStore,
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Stores each document as `<dir>/<name>.json`
///
/// Writes go to a temporary sibling first and are renamed into place so a
/// crash never leaves a half-written session document behind.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    dir: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform configuration directory
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("pikpakdav");
        Self::new(dir)
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(&['/', '\\'][..]) || name.starts_with('.') {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid document name: {}",
                name
            )));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self, name: &str) -> Result<Option<Bytes>> {
        let path = self.document_path(name)?;
        match fs::read(&path).await {
            Ok(contents) => {
                debug!(document = name, size = contents.len(), "Loaded document");
                Ok(Some(Bytes::from(contents)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn save(&self, name: &str, contents: Bytes) -> Result<()> {
        let path = self.document_path(name)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp = self.dir.join(format!(".{}.json.tmp", name));
        fs::write(&tmp, &contents).await?;
        fs::rename(&tmp, &path).await?;

        debug!(document = name, size = contents.len(), "Saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch_store() -> JsonFileStateStore {
        JsonFileStateStore::new(env::temp_dir().join(format!("pikpakdav-test-{}", uuid::Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let store = scratch_store();
        assert!(store.load("state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = scratch_store();
        let data = Bytes::from(r#"{"deviceId":"abc"}"#);

        store.save("state", data.clone()).await.unwrap();
        assert_eq!(store.load("state").await.unwrap(), Some(data));

        store.save("state", Bytes::from("{}")).await.unwrap();
        assert_eq!(store.load("state").await.unwrap(), Some(Bytes::from("{}")));

        fs::remove_dir_all(store.directory()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let store = scratch_store();
        assert!(store.load("../state").await.is_err());
        assert!(store.save("", Bytes::new()).await.is_err());
    }
}

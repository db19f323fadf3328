use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tokio::{fs, sync::RwLock};
use tracing::warn;

use crate::errors::StoreError;

/// String map persisted as a single JSON object on disk.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonMapStore {
    inner: RwLock<BTreeMap<String, String>>,
    file_path: PathBuf,
}

impl JsonMapStore {
    /// Load the map from `path`. A missing file is an empty map; an unreadable
    /// or corrupt file is logged and treated as empty.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, StoreError> {
        let file_path = path.into();
        common::env::ensure_parent_dir(&file_path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let map = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "state file is corrupt; starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        Ok(Arc::new(Self { inner: RwLock::new(map), file_path }))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.file_path
    }

    async fn save(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(map).map_err(|e| StoreError::Serde(e.to_string()))?;
        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, data).await.map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.file_path).await.map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    /// Set several keys and persist once.
    pub async fn insert_many<I>(&self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = self.inner.write().await;
        map.extend(entries);
        self.save(&map).await
    }

    /// Remove several keys and persist once; returns how many existed.
    pub async fn remove_many(&self, keys: &[&str]) -> Result<usize, StoreError> {
        let mut map = self.inner.write().await;
        let removed = keys.iter().filter(|k| map.remove(**k).is_some()).count();
        self.save(&map).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_map_store_persists_across_reopen() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_{}.json", uuid::Uuid::new_v4()));
        let store = JsonMapStore::open(&tmp).await?;
        assert_eq!(store.get("a").await, None);

        store
            .insert_many([("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())])
            .await?;
        assert_eq!(store.get("a").await.as_deref(), Some("1"));

        let removed = store.remove_many(&["b", "missing"]).await?;
        assert_eq!(removed, 1);

        let reopened = JsonMapStore::open(&tmp).await?;
        assert_eq!(reopened.get("a").await.as_deref(), Some("1"));
        assert_eq!(reopened.get("b").await, None);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, b"{not json").await?;
        let store = JsonMapStore::open(&tmp).await?;
        assert_eq!(store.get("authToken").await, None);
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}

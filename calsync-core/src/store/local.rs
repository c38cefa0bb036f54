use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{CalSyncError, CalSyncResult};
use crate::store::Store;

/// Store backed by a single JSON document on disk.
///
/// The document is loaded on first access and rewritten in full on every
/// change: written to a temp file first, then renamed over the original.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    cache: Mutex<Option<Map<String, Value>>>,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalStore {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Default location: `<data_dir>/calsync/<entry_id>.json`.
    pub fn for_entry(entry_id: &str) -> CalSyncResult<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| CalSyncError::Config("Could not determine data directory".into()))?
            .join("calsync");
        Ok(LocalStore::new(dir.join(format!("{entry_id}.json"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the backing file and forget everything cached.
    pub async fn async_remove(&self) -> CalSyncResult<()> {
        let mut cache = self.cache.lock().await;
        *cache = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self) -> CalSyncResult<Map<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => Ok(map),
                _ => Err(CalSyncError::Store(format!(
                    "{} does not contain a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `change` to a copy of the document and persist it. The cached
    /// copy is only replaced once the file is written. `change` returns
    /// whether anything changed.
    async fn update(&self, change: impl FnOnce(&mut Map<String, Value>) -> bool) -> CalSyncResult<()> {
        let mut cache = self.cache.lock().await;
        let mut data = match cache.as_ref() {
            Some(data) => data.clone(),
            None => self.load().await?,
        };
        if !change(&mut data) {
            return Ok(());
        }
        self.persist(&data).await?;
        *cache = Some(data);
        Ok(())
    }

    async fn persist(&self, data: &Map<String, Value>) -> CalSyncResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let content = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn read(&self, key: &str) -> CalSyncResult<Option<Value>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache.as_ref().and_then(|data| data.get(key).cloned()))
    }

    async fn write(&self, key: &str, value: Value) -> CalSyncResult<()> {
        self.update(|data| {
            data.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> CalSyncResult<()> {
        self.update(|data| data.remove(key).is_some()).await
    }

    async fn keys(&self) -> CalSyncResult<Vec<String>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        let mut keys: Vec<String> = cache
            .as_ref()
            .map(|data| data.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = LocalStore::new(&path);
        store.write("work/sync", json!({"events": []})).await.unwrap();
        store.write("home/sync", json!({"events": [1]})).await.unwrap();

        let reopened = LocalStore::new(&path);
        assert_eq!(
            reopened.read("work/sync").await.unwrap(),
            Some(json!({"events": []}))
        );
        assert_eq!(reopened.keys().await.unwrap(), vec!["home/sync", "work/sync"]);
        assert!(!dir.path().join("store.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_async_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = LocalStore::new(&path);
        store.write("k", json!(1)).await.unwrap();
        assert!(path.exists());

        store.async_remove().await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.read("k").await.unwrap(), None);
        // Removing twice is fine
        store.async_remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_matching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = LocalStore::new(&path);
        store.write("k", json!(1)).await.unwrap();

        // A directory in the way of the temp file makes persisting fail
        std::fs::create_dir(dir.path().join("store.json.tmp")).unwrap();
        assert!(store.write("k", json!(2)).await.is_err());
        assert!(store.remove("k").await.is_err());

        assert_eq!(store.read("k").await.unwrap(), Some(json!(1)));
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["k"], json!(1));
    }

    #[tokio::test]
    async fn test_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = LocalStore::new(&path);
        assert!(matches!(store.read("k").await, Err(CalSyncError::Store(_))));
    }
}

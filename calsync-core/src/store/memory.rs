use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::CalSyncResult;
use crate::store::Store;

/// Store without persistence. State is lost on restart, which forces a full resync.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn read(&self, key: &str) -> CalSyncResult<Option<Value>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> CalSyncResult<()> {
        self.data.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CalSyncResult<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> CalSyncResult<Vec<String>> {
        let mut keys: Vec<String> = self.data.lock().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_read_remove() {
        let store = InMemoryStore::new();
        assert_eq!(store.read("a").await.unwrap(), None);

        store.write("a", json!({"n": 1})).await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), Some(json!({"n": 1})));

        store.remove("a").await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CalSyncResult;
use crate::store::Store;

/// A view of another store confined to one scope.
///
/// Every key is stored as `<scope>/<key>` in the wrapped store, so scopes
/// sharing a backing store never see each other's data.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn Store>,
    scope: String,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn Store>, scope: impl Into<String>) -> Self {
        ScopedStore {
            inner,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn prefix(&self) -> String {
        format!("{}/", self.scope)
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}/{}", self.scope, key)
    }
}

#[async_trait]
impl Store for ScopedStore {
    async fn read(&self, key: &str) -> CalSyncResult<Option<Value>> {
        self.inner.read(&self.scoped_key(key)).await
    }

    async fn write(&self, key: &str, value: Value) -> CalSyncResult<()> {
        self.inner.write(&self.scoped_key(key), value).await
    }

    async fn remove(&self, key: &str) -> CalSyncResult<()> {
        self.inner.remove(&self.scoped_key(key)).await
    }

    async fn keys(&self) -> CalSyncResult<Vec<String>> {
        let prefix = self.prefix();
        Ok(self
            .inner
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

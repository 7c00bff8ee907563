//! Sled-based Settings Store

use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;

use crate::application::ports::{SettingsStorePort, StoreError};

const TREE_NAME: &str = "settings";

fn store_err(e: sled::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// 持久化的本地偏好
pub struct SledSettingsStore {
    tree: Tree,
}

impl SledSettingsStore {
    /// 在已打开的数据库中使用 `settings` 树
    pub fn new(db: &Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(TREE_NAME).map_err(store_err)?;
        Ok(Self { tree })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref()).map_err(store_err)?;
        tracing::info!(path = %path.as_ref().display(), "SledSettingsStore opened");
        Self::new(&db)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl SettingsStorePort for SledSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.tree.get(key).map_err(store_err)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tree.insert(key, value.as_bytes()).map_err(store_err)?;
        self.tree.flush().map_err(store_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.tree.remove(key).map_err(store_err)?;
        Ok(())
    }
}

//! 内存设置存储
//!
//! 用于测试和不需要跨进程保留偏好的场景

use dashmap::DashMap;

use crate::application::ports::{SettingsStorePort, StoreError};

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: DashMap<String, String>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStorePort for InMemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

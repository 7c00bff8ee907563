//! Settings Store Port - 本地键值存储
//!
//! 对应客户端本地存储：字符串键 → JSON 字符串

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// 本地设置存储
///
/// 每次读写都是单个原子键值操作
pub trait SettingsStorePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

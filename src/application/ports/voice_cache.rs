//! Voice Cache Port - 合成语音缓存
//!
//! 定义语音缓存的抽象接口，具体实现使用 Sled

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Voice Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Refusing to cache empty audio")]
    EmptyAudio,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCacheEntry {
    pub audio_data: Vec<u8>,
    /// 创建时间（毫秒时间戳）
    pub timestamp: i64,
    pub text: String,
    pub voice_id: String,
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Voice Cache Port
///
/// 读穿透缓存，key = md5(规范化文本) + voice_id
/// - 条目过期时间 7 天
/// - 超出容量时按创建时间淘汰最旧的一批
#[async_trait]
pub trait VoiceCachePort: Send + Sync {
    /// 获取缓存的语音；过期条目视为未命中并删除
    async fn get(&self, text: &str, voice_id: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// 存储语音；空音频返回 `EmptyAudio`
    async fn put(&self, text: &str, voice_id: &str, audio_data: Vec<u8>)
        -> Result<(), CacheError>;

    /// 删除所有过期条目，返回删除数量
    async fn purge_expired(&self) -> Result<usize, CacheError>;

    /// 清空缓存
    async fn clear(&self) -> Result<(), CacheError>;

    /// 获取缓存统计信息
    async fn stats(&self) -> CacheStats;
}

/// 规范化文本：去掉首尾空白并转小写
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// 生成缓存 key
///
/// 使用 md5(规范化文本) + voice_id 作为缓存 key
pub fn generate_cache_key(text: &str, voice_id: &str) -> String {
    let digest = md5::compute(normalize_text(text).as_bytes());
    format!("{:x}:{}", digest, voice_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_normalizes_text() {
        assert_eq!(
            generate_cache_key("  The Room Remembers ", "v1"),
            generate_cache_key("the room remembers", "v1")
        );
        assert_ne!(
            generate_cache_key("the room remembers", "v1"),
            generate_cache_key("the room remembers", "v2")
        );
    }
}

//! Sled 存储实现
//!
//! - voice_cache: 语音缓存（TTL + 容量上限）
//! - settings_store: 本地偏好键值

mod settings_store;
mod voice_cache;

pub use settings_store::SledSettingsStore;
pub use voice_cache::{SledVoiceCache, SledVoiceCacheConfig, DEFAULT_TTL_MS};

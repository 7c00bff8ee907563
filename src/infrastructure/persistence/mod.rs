//! Persistence Layer - 数据持久化
//!
//! Sled 存储实现（语音缓存、本地偏好）与内存存储

pub mod memory;
pub mod sled;

pub use self::memory::InMemorySettingsStore;
pub use self::sled::{SledSettingsStore, SledVoiceCache, SledVoiceCacheConfig};

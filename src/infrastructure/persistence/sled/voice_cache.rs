//! Sled-based Voice Cache Implementation
//!
//! 条目按创建时间过期，超出容量时淘汰最旧的一批

use async_trait::async_trait;
use chrono::Utc;
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{
    generate_cache_key, CacheError, CacheStats, VoiceCacheEntry, VoiceCachePort,
};

/// 7 天（毫秒）
pub const DEFAULT_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const KEY_PREFIX: &str = "voice:";

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledVoiceCacheConfig {
    /// 数据库路径
    pub db_path: String,
    /// 最大条目数
    pub max_entries: usize,
    /// 超出容量时一次淘汰的条目数
    pub evict_count: usize,
    /// 条目存活时间（毫秒）
    pub ttl_ms: i64,
}

impl Default for SledVoiceCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/voice_cache.sled".to_string(),
            max_entries: 100,
            evict_count: 20,
            ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

fn db_err(e: sled::Error) -> CacheError {
    CacheError::DatabaseError(e.to_string())
}

/// Sled 语音缓存
pub struct SledVoiceCache {
    db: Db,
    max_entries: usize,
    evict_count: usize,
    ttl_ms: i64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledVoiceCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledVoiceCacheConfig) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path).map_err(db_err)?;
        let cache = Self::with_db(db, config);
        tracing::info!(
            db_path = %config.db_path,
            max_entries = config.max_entries,
            entries = cache.entry_count(),
            "SledVoiceCache initialized"
        );
        Ok(cache)
    }

    /// 打开指定路径的缓存（默认容量与 TTL）
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Self::new(&SledVoiceCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    /// 进程退出即丢弃的缓存
    pub fn temporary(config: &SledVoiceCacheConfig) -> Result<Self, CacheError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(db_err)?;
        Ok(Self::with_db(db, config))
    }

    fn with_db(db: Db, config: &SledVoiceCacheConfig) -> Self {
        Self {
            db,
            max_entries: config.max_entries.max(1),
            evict_count: config.evict_count.max(1),
            ttl_ms: config.ttl_ms,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn entry_count(&self) -> usize {
        self.db.scan_prefix(KEY_PREFIX).count()
    }

    fn is_expired(&self, entry: &VoiceCacheEntry, now: i64) -> bool {
        now - entry.timestamp > self.ttl_ms
    }

    fn store_entry(&self, entry: &VoiceCacheEntry) -> Result<(), CacheError> {
        let key = format!("{}{}", KEY_PREFIX, generate_cache_key(&entry.text, &entry.voice_id));
        let bytes =
            bincode::serialize(entry).map_err(|e| CacheError::SerializationError(e.to_string()))?;
        self.db.insert(key, bytes).map_err(db_err)?;
        Ok(())
    }

    /// 所有条目（key + 条目），无法解析的条目直接删除
    fn scan_entries(&self) -> Result<Vec<(sled::IVec, VoiceCacheEntry)>, CacheError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(KEY_PREFIX) {
            let (key, value) = item.map_err(db_err)?;
            match bincode::deserialize::<VoiceCacheEntry>(&value) {
                Ok(entry) => entries.push((key, entry)),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unreadable voice cache entry");
                    self.db.remove(&key).map_err(db_err)?;
                }
            }
        }
        Ok(entries)
    }

    /// 超出容量时按创建时间淘汰最旧的一批
    fn evict_oldest(&self) -> Result<usize, CacheError> {
        let mut entries = self.scan_entries()?;
        if entries.len() <= self.max_entries {
            return Ok(0);
        }

        entries.sort_by_key(|(_, entry)| entry.timestamp);
        let mut evicted = 0;
        for (key, _) in entries.iter().take(self.evict_count) {
            self.db.remove(key).map_err(db_err)?;
            evicted += 1;
        }
        tracing::debug!(evicted, remaining = entries.len() - evicted, "Voice cache evicted");
        Ok(evicted)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush().map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl VoiceCachePort for SledVoiceCache {
    async fn get(&self, text: &str, voice_id: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = format!("{}{}", KEY_PREFIX, generate_cache_key(text, voice_id));

        let data = match self.db.get(&key).map_err(db_err)? {
            Some(data) => data,
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        let entry: VoiceCacheEntry = bincode::deserialize(&data)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        if self.is_expired(&entry, Utc::now().timestamp_millis()) {
            self.db.remove(&key).map_err(db_err)?;
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(voice_id, "Voice cache entry expired");
            return Ok(None);
        }

        self.hit_count.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.audio_data))
    }

    async fn put(
        &self,
        text: &str,
        voice_id: &str,
        audio_data: Vec<u8>,
    ) -> Result<(), CacheError> {
        if audio_data.is_empty() {
            return Err(CacheError::EmptyAudio);
        }

        let size = audio_data.len();
        self.store_entry(&VoiceCacheEntry {
            audio_data,
            timestamp: Utc::now().timestamp_millis(),
            text: text.to_string(),
            voice_id: voice_id.to_string(),
        })?;
        self.evict_oldest()?;

        tracing::debug!(voice_id, size_bytes = size, "Voice cached");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Utc::now().timestamp_millis();
        let mut purged = 0;
        for (key, entry) in self.scan_entries()? {
            if self.is_expired(&entry, now) {
                self.db.remove(&key).map_err(db_err)?;
                purged += 1;
            }
        }
        if purged > 0 {
            tracing::info!(purged, "Expired voice cache entries removed");
        }
        Ok(purged)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        for item in self.db.scan_prefix(KEY_PREFIX).keys() {
            let key = item.map_err(db_err)?;
            self.db.remove(key).map_err(db_err)?;
        }
        tracing::info!("Voice cache cleared");
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let (total_entries, total_size_bytes) = match self.scan_entries() {
            Ok(entries) => (
                entries.len(),
                entries.iter().map(|(_, e)| e.audio_data.len() as u64).sum(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to scan voice cache");
                (0, 0)
            }
        };

        CacheStats {
            total_entries,
            total_size_bytes,
            max_entries: self.max_entries,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

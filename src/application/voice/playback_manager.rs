//! Voice Playback Manager - 语音排队、缓存、ducking 与顺序播放
//!
//! 一次只播放一句；新入队不会打断正在播放的语音，只会延长队列

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

use crate::application::engine::AmbientDucker;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    InferRequest, SettingsStorePort, SpeechPlayerPort, TtsEnginePort, TtsError, VoiceCachePort,
};
use crate::application::preferences::{
    load_audio_preferences, save_audio_preferences, DEFAULT_VOICE_ID,
};

/// 播放管理器配置
#[derive(Debug, Clone)]
pub struct VoicePlaybackConfig {
    /// 两句之间的停顿
    pub pacing: Duration,
    /// 播放期间声床压低量（dB，负数）
    pub duck_db: f32,
    pub duck_ramp_secs: f64,
    pub restore_ramp_secs: f64,
}

impl Default for VoicePlaybackConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(600),
            duck_db: -6.0,
            duck_ramp_secs: 0.3,
            restore_ramp_secs: 0.8,
        }
    }
}

/// 播放事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Started {
        id: u64,
        text: String,
        voice_id: String,
        cached: bool,
    },
    Finished {
        id: u64,
        success: bool,
    },
}

/// 队列状态快照
#[derive(Debug, Clone, Serialize)]
pub struct VoiceQueueStatus {
    pub pending: usize,
    pub playing: bool,
    pub default_voice: String,
}

/// 入队凭据，`wait` 在该句结束（或被丢弃）时返回是否播放成功
#[derive(Debug)]
pub struct PlaybackTicket {
    id: u64,
    rx: Option<oneshot::Receiver<bool>>,
}

impl PlaybackTicket {
    fn rejected() -> Self {
        Self { id: 0, rx: None }
    }

    /// 0 表示被拒绝（空文本）
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_rejected(&self) -> bool {
        self.rx.is_none()
    }

    pub async fn wait(self) -> bool {
        match self.rx {
            Some(rx) => rx.await.unwrap_or(false),
            None => false,
        }
    }
}

struct QueuedUtterance {
    id: u64,
    text: String,
    voice_id: String,
    priority: i32,
    done: oneshot::Sender<bool>,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueuedUtterance>,
    draining: bool,
    /// `stop` 时递增，旧的 drain 循环据此退出
    generation: u64,
    current: Option<u64>,
}

impl QueueState {
    /// 按优先级降序插入，同优先级先进先出
    fn insert(&mut self, item: QueuedUtterance) {
        let pos = self
            .items
            .iter()
            .position(|queued| queued.priority < item.priority)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }
}

struct Inner {
    config: VoicePlaybackConfig,
    tts: Arc<dyn TtsEnginePort>,
    cache: Arc<dyn VoiceCachePort>,
    player: Arc<dyn SpeechPlayerPort>,
    ducker: Arc<dyn AmbientDucker>,
    store: Option<Arc<dyn SettingsStorePort>>,
    queue: Mutex<QueueState>,
    next_id: AtomicU64,
    events: broadcast::Sender<PlaybackEvent>,
}

/// 播放期间保持声床压低，离开作用域时恢复
struct DuckGuard<'a> {
    ducker: &'a dyn AmbientDucker,
    restore_ramp_secs: f64,
}

impl<'a> DuckGuard<'a> {
    fn engage(ducker: &'a dyn AmbientDucker, config: &VoicePlaybackConfig) -> Self {
        ducker.duck_ambient(config.duck_db, config.duck_ramp_secs);
        Self {
            ducker,
            restore_ramp_secs: config.restore_ramp_secs,
        }
    }
}

impl Drop for DuckGuard<'_> {
    fn drop(&mut self) {
        self.ducker.restore_ambient(self.restore_ramp_secs);
    }
}

/// 语音播放管理器
#[derive(Clone)]
pub struct VoicePlaybackManager {
    inner: Arc<Inner>,
}

impl VoicePlaybackManager {
    pub fn new(
        config: VoicePlaybackConfig,
        tts: Arc<dyn TtsEnginePort>,
        cache: Arc<dyn VoiceCachePort>,
        player: Arc<dyn SpeechPlayerPort>,
        ducker: Arc<dyn AmbientDucker>,
        store: Option<Arc<dyn SettingsStorePort>>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                config,
                tts,
                cache,
                player,
                ducker,
                store,
                queue: Mutex::new(QueueState::default()),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: PlaybackEvent) {
        // 没有订阅者时忽略
        let _ = self.inner.events.send(event);
    }

    // ========== 默认音色 ==========

    pub fn default_voice(&self) -> String {
        match &self.inner.store {
            Some(store) => load_audio_preferences(store.as_ref()).voice_id().to_string(),
            None => DEFAULT_VOICE_ID.to_string(),
        }
    }

    pub fn set_default_voice(&self, voice_id: &str) -> Result<(), ApplicationError> {
        let voice_id = voice_id.trim();
        if voice_id.is_empty() {
            return Err(ApplicationError::validation("voice_id must not be empty"));
        }
        let store = self
            .inner
            .store
            .as_ref()
            .ok_or_else(|| ApplicationError::invalid_state("No settings store configured"))?;
        let mut preferences = load_audio_preferences(store.as_ref());
        preferences.voice_id = Some(voice_id.to_string());
        save_audio_preferences(store.as_ref(), &preferences)?;
        tracing::info!(voice_id, "Default voice updated");
        Ok(())
    }

    // ========== 队列 ==========

    /// 入队一句语音；空文本立即以 `false` 结束
    ///
    /// 空闲时启动 drain 任务，需在 tokio runtime 中调用
    pub fn enqueue(&self, text: &str, voice_id: Option<&str>, priority: i32) -> PlaybackTicket {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring empty whisper");
            return PlaybackTicket::rejected();
        }
        let voice_id = match voice_id.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None => self.default_voice(),
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (done, rx) = oneshot::channel();

        let mut queue = self.lock();
        queue.insert(QueuedUtterance {
            id,
            text: text.to_string(),
            voice_id,
            priority,
            done,
        });
        tracing::debug!(id, priority, pending = queue.items.len(), "Whisper queued");

        if !queue.draining {
            queue.draining = true;
            let generation = queue.generation;
            let manager = self.clone();
            tokio::spawn(async move {
                manager.drain(generation).await;
            });
        }

        PlaybackTicket { id, rx: Some(rx) }
    }

    /// 入队并等待播放结束
    pub async fn queue_whisper(&self, text: &str, voice_id: Option<&str>, priority: i32) -> bool {
        self.enqueue(text, voice_id, priority).wait().await
    }

    async fn drain(self, generation: u64) {
        tracing::debug!(generation, "Voice queue drain started");
        loop {
            tokio::time::sleep(self.inner.config.pacing).await;

            let item = {
                let mut queue = self.lock();
                if queue.generation != generation {
                    return;
                }
                match queue.items.pop_front() {
                    Some(item) => {
                        queue.current = Some(item.id);
                        item
                    }
                    None => {
                        queue.draining = false;
                        tracing::debug!(generation, "Voice queue drained");
                        return;
                    }
                }
            };

            let success = self.speak(&item, generation).await;

            {
                let mut queue = self.lock();
                if queue.current == Some(item.id) {
                    queue.current = None;
                }
            }
            let _ = item.done.send(success);
            self.emit(PlaybackEvent::Finished {
                id: item.id,
                success,
            });
        }
    }

    async fn speak(&self, item: &QueuedUtterance, generation: u64) -> bool {
        let (audio, cached) = match self.resolve_audio(&item.text, &item.voice_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(id = item.id, voice_id = %item.voice_id, error = %e, "Speech synthesis failed");
                return false;
            }
        };

        if self.lock().generation != generation {
            tracing::debug!(id = item.id, "Dropping speech resolved after stop");
            return false;
        }

        let _duck = DuckGuard::engage(self.inner.ducker.as_ref(), &self.inner.config);
        self.emit(PlaybackEvent::Started {
            id: item.id,
            text: item.text.clone(),
            voice_id: item.voice_id.clone(),
            cached,
        });

        match self.inner.player.play(audio).await {
            Ok(()) => {
                tracing::debug!(id = item.id, cached, "Whisper spoken");
                true
            }
            Err(e) => {
                tracing::warn!(id = item.id, error = %e, "Speech playback failed");
                false
            }
        }
    }

    /// 读穿透缓存：命中直接返回，否则调用 TTS 并写回
    async fn resolve_audio(&self, text: &str, voice_id: &str) -> Result<(Vec<u8>, bool), TtsError> {
        match self.inner.cache.get(text, voice_id).await {
            Ok(Some(audio)) => return Ok((audio, true)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Voice cache read failed"),
        }

        let response = self
            .inner
            .tts
            .infer(InferRequest {
                text: text.to_string(),
                voice_id: voice_id.to_string(),
            })
            .await?;

        if let Err(e) = self
            .inner
            .cache
            .put(text, voice_id, response.audio_data.clone())
            .await
        {
            tracing::warn!(error = %e, "Voice cache write failed");
        }
        Ok((response.audio_data, false))
    }

    /// 停止当前播放，清空队列并恢复声床
    pub fn stop(&self) {
        let pending = {
            let mut queue = self.lock();
            queue.generation += 1;
            queue.draining = false;
            queue.current = None;
            std::mem::take(&mut queue.items)
        };

        let dropped = pending.len();
        for item in pending {
            let _ = item.done.send(false);
        }
        self.inner.player.stop();
        self.inner
            .ducker
            .restore_ambient(self.inner.config.restore_ramp_secs);
        tracing::info!(dropped, "Voice playback stopped");
    }

    pub fn pending(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().current.is_some()
    }

    pub fn status(&self) -> VoiceQueueStatus {
        let (pending, playing) = {
            let queue = self.lock();
            (queue.items.len(), queue.current.is_some())
        };
        VoiceQueueStatus {
            pending,
            playing,
            default_voice: self.default_voice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CacheError, CacheStats, InferResponse, PlaybackError};
    use crate::infrastructure::persistence::memory::InMemorySettingsStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// 把文本原样当作音频返回
    #[derive(Default)]
    struct EchoTts {
        calls: AtomicUsize,
        voices: Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    #[async_trait]
    impl TtsEnginePort for EchoTts {
        async fn infer(&self, request: InferRequest) -> Result<InferResponse, TtsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.voices.lock().unwrap().push(request.voice_id.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(TtsError::ServiceError("boom".into()));
            }
            Ok(InferResponse {
                audio_data: request.text.into_bytes(),
                content_type: None,
            })
        }
    }

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl VoiceCachePort for MapCache {
        async fn get(&self, text: &str, voice_id: &str) -> Result<Option<Vec<u8>>, CacheError> {
            let key = crate::application::ports::generate_cache_key(text, voice_id);
            Ok(self.entries.lock().unwrap().get(&key).cloned())
        }

        async fn put(&self, text: &str, voice_id: &str, audio: Vec<u8>) -> Result<(), CacheError> {
            let key = crate::application::ports::generate_cache_key(text, voice_id);
            self.entries.lock().unwrap().insert(key, audio);
            Ok(())
        }

        async fn purge_expired(&self) -> Result<usize, CacheError> {
            Ok(0)
        }

        async fn clear(&self) -> Result<(), CacheError> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
    }

    /// 记录播放顺序；`fail_on` 中的文本播放失败；`hold` 时阻塞直到 stop
    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<String>>,
        fail_on: Vec<String>,
        hold: bool,
        started: Notify,
        stopped: Notify,
    }

    #[async_trait]
    impl SpeechPlayerPort for RecordingPlayer {
        async fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
            let text = String::from_utf8(audio).unwrap();
            self.played.lock().unwrap().push(text.clone());
            self.started.notify_one();
            if self.hold {
                self.stopped.notified().await;
                return Err(PlaybackError::Interrupted);
            }
            if self.fail_on.contains(&text) {
                return Err(PlaybackError::Decode("corrupt".into()));
            }
            Ok(())
        }

        fn stop(&self) {
            self.stopped.notify_one();
        }
    }

    #[derive(Default)]
    struct RecordingDucker {
        ducks: AtomicUsize,
        restores: AtomicUsize,
    }

    impl AmbientDucker for RecordingDucker {
        fn duck_ambient(&self, _amount_db: f32, _ramp_secs: f64) {
            self.ducks.fetch_add(1, Ordering::SeqCst);
        }

        fn restore_ambient(&self, _ramp_secs: f64) {
            self.restores.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> VoicePlaybackConfig {
        VoicePlaybackConfig {
            pacing: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn manager(
        tts: Arc<EchoTts>,
        player: Arc<RecordingPlayer>,
        ducker: Arc<RecordingDucker>,
    ) -> VoicePlaybackManager {
        VoicePlaybackManager::new(
            fast_config(),
            tts,
            Arc::new(MapCache::default()),
            player,
            ducker,
            None,
        )
    }

    #[tokio::test]
    async fn test_priority_order_is_stable() {
        let player = Arc::new(RecordingPlayer::default());
        let m = manager(
            Arc::new(EchoTts::default()),
            player.clone(),
            Arc::new(RecordingDucker::default()),
        );

        let tickets = vec![
            m.enqueue("low", None, 1),
            m.enqueue("high", None, 3),
            m.enqueue("mid", None, 2),
            m.enqueue("mid again", None, 2),
        ];
        for ticket in tickets {
            assert!(ticket.wait().await);
        }
        assert_eq!(
            *player.played.lock().unwrap(),
            vec!["high", "mid", "mid again", "low"]
        );
        assert!(!m.is_playing());
        assert_eq!(m.pending(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_resolves_false() {
        let tts = Arc::new(EchoTts::default());
        let m = manager(
            tts.clone(),
            Arc::new(RecordingPlayer::default()),
            Arc::new(RecordingDucker::default()),
        );
        let ticket = m.enqueue("   ", None, 0);
        assert!(ticket.is_rejected());
        assert!(!ticket.wait().await);
        assert!(!m.queue_whisper("", None, 0).await);
        assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_tts() {
        let tts = Arc::new(EchoTts::default());
        let player = Arc::new(RecordingPlayer::default());
        let m = manager(tts.clone(), player.clone(), Arc::new(RecordingDucker::default()));

        assert!(m.queue_whisper("Hello there", Some("v1"), 0).await);
        assert!(m.queue_whisper("  hello there ", Some("v1"), 0).await);
        assert_eq!(tts.calls.load(Ordering::SeqCst), 1);

        // 不同音色不共享缓存
        assert!(m.queue_whisper("Hello there", Some("v2"), 0).await);
        assert_eq!(tts.calls.load(Ordering::SeqCst), 2);
        assert_eq!(player.played.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_playback_error_restores_and_continues() {
        let player = Arc::new(RecordingPlayer {
            fail_on: vec!["broken".to_string()],
            ..Default::default()
        });
        let ducker = Arc::new(RecordingDucker::default());
        let m = manager(Arc::new(EchoTts::default()), player.clone(), ducker.clone());

        let first = m.enqueue("broken", None, 0);
        let second = m.enqueue("fine", None, 0);
        assert!(!first.wait().await);
        assert!(second.wait().await);

        assert_eq!(ducker.ducks.load(Ordering::SeqCst), 2);
        assert_eq!(ducker.restores.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tts_failure_resolves_false_without_ducking() {
        let tts = Arc::new(EchoTts {
            fail: true,
            ..Default::default()
        });
        let ducker = Arc::new(RecordingDucker::default());
        let m = manager(tts, Arc::new(RecordingPlayer::default()), ducker.clone());

        assert!(!m.queue_whisper("unreachable", None, 0).await);
        assert_eq!(ducker.ducks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_clears_queue_and_restores() {
        let player = Arc::new(RecordingPlayer {
            hold: true,
            ..Default::default()
        });
        let ducker = Arc::new(RecordingDucker::default());
        let m = manager(Arc::new(EchoTts::default()), player.clone(), ducker.clone());

        let playing = m.enqueue("first", None, 0);
        let queued = m.enqueue("second", None, 0);
        player.started.notified().await;
        assert!(m.is_playing());

        m.stop();
        assert!(!playing.wait().await);
        assert!(!queued.wait().await);
        assert_eq!(*player.played.lock().unwrap(), vec!["first"]);
        assert!(ducker.restores.load(Ordering::SeqCst) >= 1);
        assert_eq!(m.pending(), 0);
    }

    #[tokio::test]
    async fn test_speech_resolved_after_stop_is_dropped() {
        let gate = Arc::new(Notify::new());
        let tts = Arc::new(EchoTts {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let player = Arc::new(RecordingPlayer::default());
        let m = manager(tts.clone(), player.clone(), Arc::new(RecordingDucker::default()));

        let ticket = m.enqueue("late", None, 0);
        while tts.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        m.stop();
        gate.notify_one();

        assert!(!ticket.wait().await);
        assert!(player.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_voice_persists() {
        let tts = Arc::new(EchoTts::default());
        let store = Arc::new(InMemorySettingsStore::new());
        let m = VoicePlaybackManager::new(
            fast_config(),
            tts.clone(),
            Arc::new(MapCache::default()),
            Arc::new(RecordingPlayer::default()),
            Arc::new(RecordingDucker::default()),
            Some(store.clone()),
        );

        assert_eq!(m.default_voice(), DEFAULT_VOICE_ID);
        m.set_default_voice("velvet").unwrap();
        assert!(m.set_default_voice("  ").is_err());
        assert!(m.queue_whisper("hi", None, 0).await);
        assert_eq!(*tts.voices.lock().unwrap(), vec!["velvet"]);
        assert_eq!(load_audio_preferences(store.as_ref()).voice_id(), "velvet");
    }

    #[tokio::test]
    async fn test_events_report_start_and_finish() {
        let m = manager(
            Arc::new(EchoTts::default()),
            Arc::new(RecordingPlayer::default()),
            Arc::new(RecordingDucker::default()),
        );
        let mut events = m.subscribe();
        let ticket = m.enqueue("announce", Some("v1"), 0);
        let id = ticket.id();
        assert!(ticket.wait().await);

        assert_eq!(
            events.recv().await.unwrap(),
            PlaybackEvent::Started {
                id,
                text: "announce".into(),
                voice_id: "v1".into(),
                cached: false,
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            PlaybackEvent::Finished { id, success: true }
        );
    }
}

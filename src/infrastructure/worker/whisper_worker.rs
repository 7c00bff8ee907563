//! Whisper Worker - 周期性片段推送

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::{VoicePlaybackManager, WhisperService};
use crate::domain::whisper::Whisper;
use crate::infrastructure::events::EventPublisher;

/// 朗读片段的优先级，低于手动入队的语音
const WHISPER_VOICE_PRIORITY: i32 = -1;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct WhisperWorkerConfig {
    /// 两次片段之间的间隔
    pub interval: Duration,
    /// 时段刷新间隔
    pub time_refresh: Duration,
    /// 是否朗读新片段
    pub speak: bool,
    /// 朗读队列积压超过该值时跳过朗读
    pub max_backlog: usize,
}

impl Default for WhisperWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12),
            time_refresh: Duration::from_secs(15 * 60),
            speak: false,
            max_backlog: 2,
        }
    }
}

/// 片段 Worker
///
/// 每个间隔取一个片段，广播给前端，按配置交给朗读队列
pub struct WhisperWorker {
    config: WhisperWorkerConfig,
    whispers: Arc<WhisperService>,
    voice: Option<VoicePlaybackManager>,
    event_publisher: Arc<EventPublisher>,
    shutdown: CancellationToken,
}

impl WhisperWorker {
    pub fn new(
        config: WhisperWorkerConfig,
        whispers: Arc<WhisperService>,
        voice: Option<VoicePlaybackManager>,
        event_publisher: Arc<EventPublisher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            whispers,
            voice,
            event_publisher,
            shutdown,
        }
    }

    /// 启动 Worker，直到取消令牌触发
    pub async fn run(self) {
        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            speak = self.config.speak,
            "WhisperWorker started"
        );

        let mut emit = tokio::time::interval(self.config.interval);
        emit.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refresh = tokio::time::interval(self.config.time_refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = refresh.tick() => {
                    self.whispers.refresh_time_of_day();
                }
                _ = emit.tick() => {
                    let whisper = self.whispers.next_whisper().await;
                    self.emit(&whisper);
                }
            }
        }

        tracing::info!("WhisperWorker stopped");
    }

    /// 推送单个片段
    fn emit(&self, whisper: &Whisper) {
        self.event_publisher.publish_whisper(whisper);

        let Some(voice) = self.voice.as_ref().filter(|_| self.config.speak) else {
            return;
        };
        if voice.pending() >= self.config.max_backlog {
            tracing::debug!(pending = voice.pending(), "Voice queue backlog, whisper not spoken");
            return;
        }
        // 结果只通过事件流观察
        let ticket = voice.enqueue(whisper.text(), None, WHISPER_VOICE_PRIORITY);
        tracing::debug!(
            whisper_id = whisper.id(),
            playback_id = ticket.id(),
            "Whisper queued for speech"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::WhisperServiceConfig;
    use crate::domain::audio::VoiceKind;
    use crate::application::{AmbientDucker, PlaybackEvent, VoicePlaybackConfig};
    use crate::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig, MixerSpeechPlayer};
    use crate::infrastructure::events::WsEvent;
    use crate::infrastructure::persistence::{SledVoiceCache, SledVoiceCacheConfig};
    use crate::infrastructure::synth::SoftwareBackend;

    struct SilentDucker;

    impl AmbientDucker for SilentDucker {
        fn duck_ambient(&self, _amount_db: f32, _ramp_secs: f64) {}

        fn restore_ambient(&self, _ramp_secs: f64) {}
    }

    #[tokio::test]
    async fn test_worker_publishes_until_cancelled() {
        let whispers = Arc::new(WhisperService::new(
            WhisperServiceConfig {
                seed: Some(1),
                ..Default::default()
            },
            VoiceKind::Lab,
            None,
        ));
        let publisher = EventPublisher::new().arc();
        let mut rx = publisher.subscribe();
        let shutdown = CancellationToken::new();

        let worker = WhisperWorker::new(
            WhisperWorkerConfig {
                interval: Duration::from_millis(10),
                ..Default::default()
            },
            whispers,
            None,
            publisher,
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(event, WsEvent::WhisperEmitted { .. }));
        }

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_speaking_worker_queues_whispers() {
        let whispers = Arc::new(WhisperService::new(
            WhisperServiceConfig {
                seed: Some(2),
                ..Default::default()
            },
            VoiceKind::Author,
            None,
        ));
        let voice = VoicePlaybackManager::new(
            VoicePlaybackConfig {
                pacing: Duration::from_millis(1),
                ..Default::default()
            },
            Arc::new(FakeTtsClient::new(FakeTtsClientConfig {
                latency: Duration::ZERO,
                ..Default::default()
            })),
            SledVoiceCache::temporary(&SledVoiceCacheConfig::default())
                .unwrap()
                .arc(),
            // 音频上下文未启动，播放立即失败
            MixerSpeechPlayer::new(SoftwareBackend::new(8_000).arc(), 1.0).arc(),
            Arc::new(SilentDucker),
            None,
        );
        let mut events = voice.subscribe();
        let shutdown = CancellationToken::new();

        let worker = WhisperWorker::new(
            WhisperWorkerConfig {
                interval: Duration::from_millis(20),
                speak: true,
                ..Default::default()
            },
            whispers,
            Some(voice.clone()),
            EventPublisher::new().arc(),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(PlaybackEvent::Finished { success, .. }) = events.recv().await {
                    return success;
                }
            }
        })
        .await
        .unwrap();
        assert!(!finished);

        shutdown.cancel();
        handle.await.unwrap();
        voice.stop();
    }
}

//! Event Publisher Implementation
//!
//! WebSocket 事件推送实现

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::application::PlaybackEvent;
use crate::domain::audio::{AudioSettings, PresentationMode};
use crate::domain::whisper::{Mood, Whisper, WhisperSource};

/// WebSocket 事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 新片段出现
    WhisperEmitted {
        id: String,
        text: String,
        mood: Mood,
        source: WhisperSource,
    },
    /// 开始朗读
    PlaybackStarted {
        id: u64,
        text: String,
        voice_id: String,
        cached: bool,
    },
    /// 朗读结束
    PlaybackFinished { id: u64, success: bool },
    /// 静音切换
    MuteChanged { muted: bool },
    /// 模式切换
    ModeChanged { mode: PresentationMode },
    /// 音频设置变更
    SettingsChanged { settings: AudioSettings },
}

impl From<&Whisper> for WsEvent {
    fn from(whisper: &Whisper) -> Self {
        Self::WhisperEmitted {
            id: whisper.id().to_string(),
            text: whisper.text().to_string(),
            mood: whisper.mood(),
            source: whisper.source(),
        }
    }
}

impl From<PlaybackEvent> for WsEvent {
    fn from(event: PlaybackEvent) -> Self {
        match event {
            PlaybackEvent::Started {
                id,
                text,
                voice_id,
                cached,
            } => Self::PlaybackStarted {
                id,
                text,
                voice_id,
                cached,
            },
            PlaybackEvent::Finished { id, success } => Self::PlaybackFinished { id, success },
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<WsEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.channel.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.channel.receiver_count()
    }

    pub fn publish(&self, event: WsEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::trace!(error = %e, "Failed to publish event (no receivers)");
        }
    }

    pub fn publish_whisper(&self, whisper: &Whisper) {
        self.publish(WsEvent::from(whisper));
    }

    pub fn publish_mute_changed(&self, muted: bool) {
        self.publish(WsEvent::MuteChanged { muted });
    }

    pub fn publish_mode_changed(&self, mode: PresentationMode) {
        self.publish(WsEvent::ModeChanged { mode });
    }

    pub fn publish_settings_changed(&self, settings: AudioSettings) {
        self.publish(WsEvent::SettingsChanged { settings });
    }

    /// 把播放事件转发为 WebSocket 事件，直到发送端关闭
    pub fn forward_playback(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<PlaybackEvent>,
    ) -> JoinHandle<()> {
        let publisher = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => publisher.publish(event.into()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Playback event forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

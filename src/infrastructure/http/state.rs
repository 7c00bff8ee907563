//! Application State
//!
//! 所有 handler 共享的服务句柄

use std::sync::Arc;

use crate::application::ports::VoiceCachePort;
use crate::application::{Soundscape, VoicePlaybackManager, WhisperService};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    pub soundscape: Arc<Soundscape>,
    pub voice: VoicePlaybackManager,
    pub whispers: Arc<WhisperService>,
    pub voice_cache: Arc<dyn VoiceCachePort>,
    pub event_publisher: Arc<EventPublisher>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        soundscape: Arc<Soundscape>,
        voice: VoicePlaybackManager,
        whispers: Arc<WhisperService>,
        voice_cache: Arc<dyn VoiceCachePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            soundscape,
            voice,
            whispers,
            voice_cache,
            event_publisher,
        }
    }
}

//! 语音播放
//!
//! 把 whisper 文本变成可听的语音：缓存、ducking、严格顺序播放

mod playback_manager;

pub use playback_manager::{
    PlaybackEvent, PlaybackTicket, VoicePlaybackConfig, VoicePlaybackManager, VoiceQueueStatus,
};

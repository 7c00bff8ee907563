//! Speech Player Port - 语音播放
//!
//! 播放一段已编码的语音，直到播放结束才返回

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Playback interrupted")]
    Interrupted,

    #[error("Output error: {0}")]
    Output(String),
}

#[async_trait]
pub trait SpeechPlayerPort: Send + Sync {
    /// 播放音频，自然结束时返回 `Ok(())`
    async fn play(&self, audio_data: Vec<u8>) -> Result<(), PlaybackError>;

    /// 立即停止当前播放；正在等待的 `play` 返回 `Interrupted`
    fn stop(&self);
}

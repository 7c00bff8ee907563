//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（AudioBackend、TtsEngine、VoiceCache、SettingsStore 等）
//! - engine: 音频引擎（信号图、声床、UI 音效、ducking）
//! - voice: 语音排队与顺序播放
//! - whisper: 片段选择与 AI 生成
//! - soundscape: 交互手势与延迟初始化
//! - preferences: 本地偏好读写
//! - error: 应用层错误定义

pub mod engine;
pub mod error;
pub mod ports;
pub mod preferences;
pub mod soundscape;
pub mod voice;
pub mod whisper;

// Re-exports
pub use engine::{AmbientDucker, AudioEngine, EngineState, EngineStatus, TriggeredNote};
pub use error::{ApplicationError, EngineError};
pub use soundscape::{Interaction, LazyEngine, Soundscape, SoundscapeStatus};
pub use voice::{PlaybackEvent, PlaybackTicket, VoicePlaybackConfig, VoicePlaybackManager};
pub use whisper::{WhisperService, WhisperServiceConfig};

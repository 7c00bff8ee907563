//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_backend;
mod settings_store;
mod speech_player;
mod text_generator;
mod tts_engine;
mod voice_cache;

pub use audio_backend::{AudioBackendPort, BackendError, NodeId, NodeSpec, NoiseColor, ParamId};
pub use settings_store::{SettingsStorePort, StoreError};
pub use speech_player::{PlaybackError, SpeechPlayerPort};
pub use text_generator::{GeneratedWhisper, TextGenError, TextGeneratorPort, WhisperPrompt};
pub use tts_engine::{InferRequest, InferResponse, TtsEnginePort, TtsError};
pub use voice_cache::{
    generate_cache_key, normalize_text, CacheError, CacheStats, VoiceCacheEntry, VoiceCachePort,
};

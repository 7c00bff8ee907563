//! Susurrus - 交互装置的生成式音频核心
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Harmony: 调性、音阶与频率
//! - Audio: 合成声部、音色、声床预设
//! - Whisper: 环境文本片段与情境选择
//!
//! 应用层 (application/):
//! - Ports: 端口定义（AudioBackend, TtsEngine, VoiceCache, SettingsStore, SpeechPlayer, TextGenerator）
//! - Engine: 音频引擎
//! - Voice: 朗读队列
//! - Whisper / Soundscape: 片段服务与交互手势
//!
//! 基础设施层 (infrastructure/):
//! - Synth: 软件合成后端与渲染驱动
//! - Adapters: TTS、文本生成、语音播放
//! - Persistence: Sled 存储
//! - HTTP: 控制面 API + WebSocket
//! - Worker / Events: 片段推送与事件广播

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};

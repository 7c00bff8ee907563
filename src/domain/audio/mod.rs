//! Audio Context - 合成参数
//!
//! 职责:
//! - 声部 / 波形 / 力度等值对象
//! - 每个声部的包络与效果参数
//! - 确定性的人性化失谐

mod profile;
mod value_objects;

use thiserror::Error;

pub use profile::{humanize_detune, AmbientPreset, Envelope, LowPass, VoiceProfile};
pub use value_objects::{
    AudioSettings, AudioSettingsPatch, PresentationMode, SettingsChange, Tone, Velocity,
    VoiceKind, VELOCITY_FLOOR_DB,
};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("无效的声部: {0}")]
    UnknownVoice(String),

    #[error("无效的波形: {0}")]
    UnknownTone(String),
}

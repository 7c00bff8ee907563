//! Audio Context - Value Objects

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::AudioError;
use crate::domain::harmony::{KeyConfig, PitchClass, ScaleMode};

/// 合成声部，每个演示模式一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    /// 精确、短促
    Architect,
    /// 温暖、低沉、长混响
    Author,
    /// 实验性、柔和滤波
    Lab,
}

/// 演示模式与合成声部一一对应
pub type PresentationMode = VoiceKind;

impl VoiceKind {
    pub const ALL: [VoiceKind; 3] = [VoiceKind::Architect, VoiceKind::Author, VoiceKind::Lab];

    pub fn index(&self) -> usize {
        match self {
            Self::Architect => 0,
            Self::Author => 1,
            Self::Lab => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Author => "author",
            Self::Lab => "lab",
        }
    }
}

impl std::fmt::Display for VoiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceKind {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "architect" => Ok(Self::Architect),
            "author" => Ok(Self::Author),
            "lab" => Ok(Self::Lab),
            _ => Err(AudioError::UnknownVoice(s.to_string())),
        }
    }
}

/// 振荡器波形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl FromStr for Tone {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Self::Sine),
            "triangle" => Ok(Self::Triangle),
            "sawtooth" | "saw" => Ok(Self::Sawtooth),
            "square" => Ok(Self::Square),
            _ => Err(AudioError::UnknownTone(s.to_string())),
        }
    }
}

/// velocity 为 0 时 UI 总线的增益
pub const VELOCITY_FLOOR_DB: f32 = -40.0;

/// 力度 (0-100)，构造时钳位
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Velocity(u8);

impl Velocity {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// 线性映射: 0 → VELOCITY_FLOOR_DB, 100 → 0 dB
    pub fn to_db(&self) -> f32 {
        VELOCITY_FLOOR_DB * (1.0 - self.0 as f32 / Self::MAX as f32)
    }
}

impl Default for Velocity {
    fn default() -> Self {
        Self(70)
    }
}

impl From<i64> for Velocity {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Velocity> for u8 {
    fn from(v: Velocity) -> Self {
        v.0
    }
}

/// 音频设置
///
/// 由控制面整体推送给引擎；引擎是 velocity → dB 换算的唯一出处
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub key: PitchClass,
    pub mode: ScaleMode,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub velocity: Velocity,
}

impl AudioSettings {
    pub fn key_config(&self) -> KeyConfig {
        KeyConfig::new(self.key, self.mode)
    }

    pub fn with_key_config(mut self, config: KeyConfig) -> Self {
        self.key = config.key;
        self.mode = config.mode;
        self
    }

    /// 应用部分更新，返回发生变化的字段
    pub fn apply(&mut self, patch: &AudioSettingsPatch) -> SettingsChange {
        let mut change = SettingsChange::default();
        if let Some(key) = patch.key {
            change.key_changed |= key != self.key;
            self.key = key;
        }
        if let Some(mode) = patch.mode {
            change.key_changed |= mode != self.mode;
            self.mode = mode;
        }
        if let Some(tone) = patch.tone {
            change.tone_changed = tone != self.tone;
            self.tone = tone;
        }
        if let Some(velocity) = patch.velocity {
            change.velocity_changed = velocity != self.velocity;
            self.velocity = velocity;
        }
        change
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        let key = KeyConfig::default();
        Self {
            key: key.key,
            mode: key.mode,
            tone: Tone::default(),
            velocity: Velocity::default(),
        }
    }
}

/// 音频设置的部分更新
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSettingsPatch {
    #[serde(default)]
    pub key: Option<PitchClass>,
    #[serde(default)]
    pub mode: Option<ScaleMode>,
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub velocity: Option<Velocity>,
}

impl AudioSettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.mode.is_none() && self.tone.is_none() && self.velocity.is_none()
    }
}

/// `AudioSettings::apply` 的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub key_changed: bool,
    pub tone_changed: bool,
    pub velocity_changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_clamped_and_mapped() {
        assert_eq!(Velocity::new(150).value(), 100);
        assert_eq!(Velocity::new(-3).value(), 0);
        assert_eq!(Velocity::new(100).to_db(), 0.0);
        assert_eq!(Velocity::new(0).to_db(), VELOCITY_FLOOR_DB);
        assert!((Velocity::new(50).to_db() - VELOCITY_FLOOR_DB / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_deserialize_clamps() {
        let v: Velocity = serde_json::from_str("250").unwrap();
        assert_eq!(v.value(), 100);
    }

    #[test]
    fn test_settings_patch_reports_changes() {
        let mut settings = AudioSettings::default();
        let patch = AudioSettingsPatch {
            key: Some(PitchClass::D),
            tone: Some(Tone::Square),
            ..Default::default()
        };
        let change = settings.apply(&patch);
        assert!(!change.key_changed);
        assert!(change.tone_changed);
        assert!(!change.velocity_changed);
        assert_eq!(settings.tone, Tone::Square);
    }

    #[test]
    fn test_voice_kind_parsing() {
        assert_eq!("Author".parse::<VoiceKind>().unwrap(), VoiceKind::Author);
        assert!("gallery".parse::<VoiceKind>().is_err());
    }
}

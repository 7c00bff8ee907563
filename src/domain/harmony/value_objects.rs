//! Harmony Context - Value Objects

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::HarmonyError;

/// 十二个音级（以 C 为 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// 相对 C 的半音数 (0-11)
    pub fn semitone(&self) -> u32 {
        match self {
            Self::C => 0,
            Self::CSharp => 1,
            Self::D => 2,
            Self::DSharp => 3,
            Self::E => 4,
            Self::F => 5,
            Self::FSharp => 6,
            Self::G => 7,
            Self::GSharp => 8,
            Self::A => 9,
            Self::ASharp => 10,
            Self::B => 11,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
        }
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PitchClass {
    type Err = HarmonyError;

    /// 接受升号和降号写法，如 "C#" / "Db"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('♯', "#").replace('♭', "b");
        let pitch = match normalized.as_str() {
            "C" | "c" | "B#" => Self::C,
            "C#" | "c#" | "Db" | "db" => Self::CSharp,
            "D" | "d" => Self::D,
            "D#" | "d#" | "Eb" | "eb" => Self::DSharp,
            "E" | "e" | "Fb" => Self::E,
            "F" | "f" | "E#" => Self::F,
            "F#" | "f#" | "Gb" | "gb" => Self::FSharp,
            "G" | "g" => Self::G,
            "G#" | "g#" | "Ab" | "ab" => Self::GSharp,
            "A" | "a" => Self::A,
            "A#" | "a#" | "Bb" | "bb" => Self::ASharp,
            "B" | "b" | "Cb" => Self::B,
            _ => return Err(HarmonyError::UnknownKey(s.to_string())),
        };
        Ok(pitch)
    }
}

/// 调式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    Major,
    Minor,
}

/// 大调音程：全-全-半-全-全-全-半
const MAJOR_STEPS: [u32; 7] = [2, 2, 1, 2, 2, 2, 1];
/// 自然小调音程：全-半-全-全-半-全-全
const MINOR_STEPS: [u32; 7] = [2, 1, 2, 2, 1, 2, 2];

impl ScaleMode {
    pub const ALL: [ScaleMode; 2] = [ScaleMode::Major, ScaleMode::Minor];

    pub fn steps(&self) -> &'static [u32; 7] {
        match self {
            Self::Major => &MAJOR_STEPS,
            Self::Minor => &MINOR_STEPS,
        }
    }

    /// 音阶第 `degree` 级（0 起，0..7）距主音的半音数
    pub fn semitones_to(&self, degree: usize) -> u32 {
        self.steps().iter().take(degree).sum()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

impl std::fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleMode {
    type Err = HarmonyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Ok(Self::Major),
            "minor" | "min" => Ok(Self::Minor),
            _ => Err(HarmonyError::UnknownMode(s.to_string())),
        }
    }
}

/// 调性配置
///
/// 不变量:
/// - 整体替换，不做部分修改
/// - 默认 D 小调
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    pub key: PitchClass,
    pub mode: ScaleMode,
}

impl KeyConfig {
    pub fn new(key: PitchClass, mode: ScaleMode) -> Self {
        Self { key, mode }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key: PitchClass::D,
            mode: ScaleMode::Minor,
        }
    }
}

impl std::fmt::Display for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key, self.mode)
    }
}

//! Whisper Context - Value Objects

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::WhisperError;
use crate::domain::audio::PresentationMode;

/// 片段情绪
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Contemplative,
    Technical,
    Creative,
    Mysterious,
    Philosophical,
}

impl FromStr for Mood {
    type Err = WhisperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contemplative" => Ok(Self::Contemplative),
            "technical" => Ok(Self::Technical),
            "creative" => Ok(Self::Creative),
            "mysterious" => Ok(Self::Mysterious),
            "philosophical" => Ok(Self::Philosophical),
            _ => Err(WhisperError::UnknownMood(s.to_string())),
        }
    }
}

/// 片段来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperSource {
    /// 内置片段池
    Curated,
    /// 文本生成服务
    Ai,
    /// 外部回声（如留言簿）
    Echo,
}

/// Whisper - 一段短小的环境文本
///
/// 创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Whisper {
    id: String,
    text: String,
    mood: Mood,
    source: WhisperSource,
}

impl Whisper {
    pub fn new(text: impl Into<String>, mood: Mood, source: WhisperSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            mood,
            source,
        }
    }

    pub fn curated(text: impl Into<String>, mood: Mood) -> Self {
        Self::new(text, mood, WhisperSource::Curated)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn source(&self) -> WhisperSource {
        self.source
    }
}

/// 一天中的时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 5-8 点
    Dawn,
    /// 8-12 点
    Morning,
    /// 12-17 点
    Afternoon,
    /// 17-20 点
    Dusk,
    /// 20-2 点
    Night,
    /// 2-5 点
    Witching,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            2..=4 => Self::Witching,
            5..=7 => Self::Dawn,
            8..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=19 => Self::Dusk,
            _ => Self::Night,
        }
    }

    pub fn at(time: DateTime<Local>) -> Self {
        Self::from_hour(time.hour())
    }

    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dawn => "dawn",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Dusk => "dusk",
            Self::Night => "night",
            Self::Witching => "witching",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 选择片段时的情境偏好
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhisperContext {
    pub mode: PresentationMode,
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub user_intent: Option<String>,
    /// 会话时长（秒）
    #[serde(default)]
    pub session_duration: Option<u64>,
}

impl WhisperContext {
    pub fn new(mode: PresentationMode, time_of_day: TimeOfDay) -> Self {
        Self {
            mode,
            time_of_day,
            user_intent: None,
            session_duration: None,
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = Some(intent.into());
        self
    }
}

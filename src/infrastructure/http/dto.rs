//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::ports::CacheStats;
use crate::application::voice::VoiceQueueStatus;
use crate::application::{Interaction, TriggeredNote};
use crate::domain::audio::{AudioSettings, PresentationMode};
use crate::domain::harmony::{KeyConfig, KeyNote};
use crate::domain::whisper::{Mood, TimeOfDay, Whisper, WhisperSource};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self::success(Empty {})
    }
}

// ============================================================================
// Soundscape DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InteractRequest {
    pub interaction: Interaction,
}

#[derive(Debug, Serialize)]
pub struct InteractResponse {
    /// 本次触发的音符（未发声时为空）
    pub note: Option<TriggeredNote>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: PresentationMode,
}

// ============================================================================
// Audio DTOs
// ============================================================================

/// `muted` 缺省时切换
#[derive(Debug, Default, Deserialize)]
pub struct MuteRequest {
    #[serde(default)]
    pub muted: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: AudioSettings,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct KeyResponse {
    #[serde(flatten)]
    pub config: KeyConfig,
    pub notes: Vec<KeyNote>,
}

// ============================================================================
// Whisper DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct WhisperResponse {
    pub id: String,
    pub text: String,
    pub mood: Mood,
    pub source: WhisperSource,
}

impl From<&Whisper> for WhisperResponse {
    fn from(whisper: &Whisper) -> Self {
        Self {
            id: whisper.id().to_string(),
            text: whisper.text().to_string(),
            mood: whisper.mood(),
            source: whisper.source(),
        }
    }
}

/// 缺省字段保持不变；`intent` 为空字符串时清除
#[derive(Debug, Default, Deserialize)]
pub struct WhisperContextRequest {
    #[serde(default)]
    pub mode: Option<PresentationMode>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<TimeOfDay>,
}

#[derive(Debug, Deserialize)]
pub struct EchoRequest {
    pub text: String,
}

// ============================================================================
// Voice DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QueueVoiceRequest {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    /// 等待该句播放结束再返回
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueVoiceResponse {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DefaultVoiceRequest {
    pub voice_id: String,
}

#[derive(Debug, Serialize)]
pub struct VoiceCacheResponse {
    pub cache: CacheStats,
    pub queue: VoiceQueueStatus,
}

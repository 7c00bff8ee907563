//! Text Generator Port - AI 片段生成
//!
//! 外部文本生成服务的抽象；调用方必须容忍它不存在或失败

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::audio::PresentationMode;
use crate::domain::whisper::{Mood, TimeOfDay};

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 生成提示
#[derive(Debug, Clone, Serialize)]
pub struct WhisperPrompt {
    pub mode: PresentationMode,
    pub time_of_day: TimeOfDay,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<u64>,
    /// 当前屏幕上已有的片段（避免重复）
    pub existing: Vec<String>,
}

/// 生成结果
#[derive(Debug, Clone)]
pub struct GeneratedWhisper {
    pub text: String,
    pub mood: Mood,
}

#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    async fn generate(&self, prompt: WhisperPrompt) -> Result<GeneratedWhisper, TextGenError>;
}

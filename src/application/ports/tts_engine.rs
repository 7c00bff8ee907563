//! TTS Engine Port - 语音合成抽象
//!
//! 定义 TTS 的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// TTS 请求
#[derive(Debug, Clone)]
pub struct InferRequest {
    /// 要合成的文本内容
    pub text: String,
    /// 音色 ID
    pub voice_id: String,
}

/// TTS 响应
#[derive(Debug, Clone)]
pub struct InferResponse {
    /// 编码后的音频（WAV / MP3）
    pub audio_data: Vec<u8>,
    /// MIME 类型
    pub content_type: Option<String>,
}

/// TTS Engine Port
///
/// 外部 TTS 服务的抽象接口
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 合成语音
    async fn infer(&self, request: InferRequest) -> Result<InferResponse, TtsError>;

    /// 检查 TTS 服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

//! Whisper 服务：片段选择 + 可选的 AI 生成

mod whisper_service;

pub use whisper_service::{WhisperService, WhisperServiceConfig, MAX_ECHO_CHARS};

//! 应用层错误定义
//!
//! 引擎环境错误 + 统一的用例错误类型

use thiserror::Error;

use crate::application::ports::{BackendError, CacheError, StoreError};

/// 引擎错误
///
/// 只有环境错误（音频上下文无法启动）会从 `init` 传出；
/// 引擎保持 Uninitialized，下一次用户手势可以重试
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Audio unavailable: {0}")]
    Unavailable(String),

    #[error("Graph construction failed: {0}")]
    Graph(#[from] BackendError),
}

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 音频引擎错误
    #[error("Engine error: {0}")]
    EngineError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<EngineError> for ApplicationError {
    fn from(err: EngineError) -> Self {
        Self::EngineError(err.to_string())
    }
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<CacheError> for ApplicationError {
    fn from(err: CacheError) -> Self {
        Self::StorageError(err.to_string())
    }
}

//! Whisper Context - 环境文本片段
//!
//! 职责:
//! - Whisper / 情境值对象
//! - 内置片段池与意图匹配
//! - 加权、去重的片段选择

mod intent;
pub mod pools;
mod selector;
mod value_objects;

use thiserror::Error;

pub use intent::{match_intent, IntentCategory};
pub use selector::WhisperSelector;
pub use value_objects::{Mood, TimeOfDay, Whisper, WhisperContext, WhisperSource};

#[derive(Debug, Error)]
pub enum WhisperError {
    #[error("无效的情绪: {0}")]
    UnknownMood(String),
}

//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Harmony Context: 调性与音高
//! - Audio Context: 合成参数与声部配置
//! - Whisper Context: 环境文本片段的选择

pub mod audio;
pub mod harmony;
pub mod whisper;

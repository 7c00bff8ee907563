//! 音频引擎
//!
//! - signal_path: 声明式信号通路
//! - graph_builder: 通路实例化
//! - audio_engine: 生命周期、声床、UI 音效、ducking

mod audio_engine;
mod graph_builder;
pub mod signal_path;

pub use audio_engine::{
    AudioEngine, EngineState, EngineStatus, GraphHandles, TriggeredNote, FADE_IN_SECS,
    FADE_OUT_SECS, LOOKAHEAD_SECS, MIN_TRIGGER_SPACING_SECS, SILENCE_DB,
};
pub use graph_builder::{build_path, BuiltPath};

/// 压低 / 恢复声床
///
/// 语音播放期间由播放管理器调用
pub trait AmbientDucker: Send + Sync {
    fn duck_ambient(&self, amount_db: f32, ramp_secs: f64);

    fn restore_ambient(&self, ramp_secs: f64);
}

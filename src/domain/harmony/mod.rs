//! Harmony Context - 调性与音高
//!
//! 职责:
//! - 调性配置 (KeyConfig)
//! - 调内音高计算
//! - 每个演示模式的和声音符集合

mod scale;
mod value_objects;

use thiserror::Error;

pub use scale::{
    drone_frequencies, harmonic_note_set, key_notes, note_frequency, HarmonicNoteSet, KeyNote,
    REFERENCE_FREQUENCY,
};
pub use value_objects::{KeyConfig, PitchClass, ScaleMode};

#[derive(Debug, Error)]
pub enum HarmonyError {
    #[error("无效的调: {0}")]
    UnknownKey(String),

    #[error("无效的调式: {0}")]
    UnknownMode(String),
}

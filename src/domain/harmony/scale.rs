//! 音高计算
//!
//! 所有声音都从同一个调性推导，保证彼此和谐

use serde::Serialize;

use super::{KeyConfig, PitchClass, ScaleMode};
use crate::domain::audio::VoiceKind;

/// 参考音高：中央 C (C4)
pub const REFERENCE_FREQUENCY: f64 = 261.63;
/// 参考音高所在八度
pub const REFERENCE_OCTAVE: i32 = 4;

/// 音阶长度
const SCALE_LENGTH: u32 = 7;

/// `key_notes` 使用的五声音阶级数（0 起，即第 1、2、3、5、6 级）
const PENTATONIC_DEGREES: [u32; 5] = [0, 1, 2, 4, 5];
/// `key_notes` 覆盖的八度范围
const KEY_NOTE_OCTAVES: std::ops::RangeInclusive<i32> = 3..=6;

/// 计算调内音的频率（Hz）
///
/// `degree` 从 0 开始，超过 7 的部分进位到更高八度。
/// 八度因子用 2 的整数次幂，升高一个八度时结果精确翻倍。
pub fn note_frequency(key: PitchClass, mode: ScaleMode, octave: i32, degree: u32) -> f64 {
    let carried_octaves = (degree / SCALE_LENGTH) as i32;
    let within = mode.semitones_to((degree % SCALE_LENGTH) as usize) + key.semitone();
    let octave_factor = 2f64.powi(octave + carried_octaves - REFERENCE_OCTAVE);
    REFERENCE_FREQUENCY * octave_factor * 2f64.powf(within as f64 / 12.0)
}

/// 调内的一个音
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyNote {
    pub octave: i32,
    pub degree: u32,
    pub frequency: f64,
}

/// 列出调内五声音阶（第 3 到第 6 八度），供显示和调试使用
pub fn key_notes(config: &KeyConfig) -> Vec<KeyNote> {
    KEY_NOTE_OCTAVES
        .flat_map(|octave| {
            PENTATONIC_DEGREES.iter().map(move |&degree| KeyNote {
                octave,
                degree,
                frequency: note_frequency(config.key, config.mode, octave, degree),
            })
        })
        .collect()
}

/// 每个演示模式的和声音符集合
///
/// 由交互计数取模轮询，重复触发时按旋律循环而不是随机
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonicNoteSet {
    pub architect: Vec<f64>,
    pub author: Vec<f64>,
    pub lab: Vec<f64>,
}

impl HarmonicNoteSet {
    pub fn for_voice(&self, voice: VoiceKind) -> &[f64] {
        match voice {
            VoiceKind::Architect => &self.architect,
            VoiceKind::Author => &self.author,
            VoiceKind::Lab => &self.lab,
        }
    }
}

/// architect: 高音区，明亮的音程
const ARCHITECT_TRAVERSAL: [(i32, u32); 8] = [
    (5, 0),
    (5, 4),
    (6, 0),
    (5, 2),
    (5, 4),
    (6, 2),
    (5, 1),
    (5, 4),
];

/// author: 低音区，宽跨度的五声音阶
const AUTHOR_TRAVERSAL: [(i32, u32); 8] = [
    (3, 0),
    (3, 4),
    (4, 0),
    (4, 2),
    (3, 5),
    (4, 4),
    (4, 1),
    (3, 4),
];

/// lab: 三度、五度、六度
const LAB_TRAVERSAL: [(i32, u32); 8] = [
    (4, 0),
    (4, 2),
    (4, 4),
    (4, 5),
    (5, 0),
    (4, 2),
    (4, 5),
    (5, 2),
];

fn traverse(config: &KeyConfig, traversal: &[(i32, u32)]) -> Vec<f64> {
    traversal
        .iter()
        .map(|&(octave, degree)| note_frequency(config.key, config.mode, octave, degree))
        .collect()
}

/// 根据调性生成三个模式的音符集合
pub fn harmonic_note_set(config: &KeyConfig) -> HarmonicNoteSet {
    HarmonicNoteSet {
        architect: traverse(config, &ARCHITECT_TRAVERSAL),
        author: traverse(config, &AUTHOR_TRAVERSAL),
        lab: traverse(config, &LAB_TRAVERSAL),
    }
}

/// 环境持续音：第 3 八度的主音和纯五度
pub fn drone_frequencies(config: &KeyConfig) -> (f64, f64) {
    (
        note_frequency(config.key, config.mode, 3, 0),
        note_frequency(config.key, config.mode, 3, 4),
    )
}

//! 声部配置与环境预设
//!
//! 每个声部的包络、效果链参数和人性化失谐范围都在这里定义

use serde::Serialize;

use super::VoiceKind;

/// ADSR 包络（秒 / 线性电平）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// 低通滤波参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowPass {
    pub cutoff_hz: f32,
    pub q: f32,
}

/// 单个声部的合成参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceProfile {
    pub envelope: Envelope,
    /// 混响衰减时间（秒）
    pub reverb_decay: f32,
    /// 混响湿声比例 (0-1)
    pub reverb_wet: f32,
    pub low_pass: Option<LowPass>,
    /// 门限时长（秒），之后进入 release
    pub note_length: f32,
    /// 最大失谐（音分，±）
    pub detune_range_cents: f32,
}

impl VoiceProfile {
    pub fn for_voice(voice: VoiceKind) -> Self {
        match voice {
            VoiceKind::Architect => Self {
                envelope: Envelope {
                    attack: 0.005,
                    decay: 0.12,
                    sustain: 0.25,
                    release: 0.4,
                },
                reverb_decay: 1.5,
                reverb_wet: 0.2,
                low_pass: None,
                note_length: 0.15,
                detune_range_cents: 4.0,
            },
            VoiceKind::Author => Self {
                envelope: Envelope {
                    attack: 0.03,
                    decay: 0.4,
                    sustain: 0.4,
                    release: 1.6,
                },
                reverb_decay: 4.5,
                reverb_wet: 0.55,
                low_pass: None,
                note_length: 0.45,
                detune_range_cents: 10.0,
            },
            VoiceKind::Lab => Self {
                envelope: Envelope {
                    attack: 0.015,
                    decay: 0.25,
                    sustain: 0.35,
                    release: 1.0,
                },
                reverb_decay: 2.5,
                reverb_wet: 0.35,
                low_pass: Some(LowPass {
                    cutoff_hz: 2200.0,
                    q: 0.8,
                }),
                note_length: 0.3,
                detune_range_cents: 24.0,
            },
        }
    }

    /// 整个包络（含 release）完整发声所需的时长
    pub fn audible_length(&self) -> f32 {
        self.note_length.max(self.envelope.attack + self.envelope.decay) + self.envelope.release
    }
}

/// 人性化失谐（音分）
///
/// 纯函数：同一声部的同一次触发总得到同一个失谐值，
/// 取值在 `±detune_range_cents` 之内
pub fn humanize_detune(voice: VoiceKind, interaction: u64) -> f32 {
    let range = VoiceProfile::for_voice(voice).detune_range_cents;
    let digest = md5::compute(format!("{}:{}", voice, interaction).as_bytes());
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&digest.0[..4]);
    let unit = u32::from_le_bytes(bytes) as f64 / u32::MAX as f64;
    ((unit * 2.0 - 1.0) * range as f64) as f32
}

/// 环境声床的模式预设
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmbientPreset {
    /// 滤波器扫频下限（Hz）
    pub filter_min_hz: f32,
    /// 滤波器扫频上限（Hz）
    pub filter_max_hz: f32,
    pub filter_q: f32,
    /// "呼吸" 周期（秒）
    pub breath_period_secs: f32,
    /// 噪声声床电平
    pub ambient_level_db: f32,
    /// 持续音电平
    pub drone_level_db: f32,
}

impl AmbientPreset {
    pub fn for_mode(mode: VoiceKind) -> Self {
        match mode {
            VoiceKind::Architect => Self {
                filter_min_hz: 300.0,
                filter_max_hz: 1400.0,
                filter_q: 2.0,
                breath_period_secs: 10.0,
                ambient_level_db: -30.0,
                drone_level_db: -36.0,
            },
            VoiceKind::Author => Self {
                filter_min_hz: 180.0,
                filter_max_hz: 800.0,
                filter_q: 3.0,
                breath_period_secs: 14.0,
                ambient_level_db: -28.0,
                drone_level_db: -32.0,
            },
            VoiceKind::Lab => Self {
                filter_min_hz: 250.0,
                filter_max_hz: 1800.0,
                filter_q: 4.0,
                breath_period_secs: 12.0,
                ambient_level_db: -29.0,
                drone_level_db: -34.0,
            },
        }
    }
}

impl Default for AmbientPreset {
    fn default() -> Self {
        Self::for_mode(VoiceKind::Author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detune_is_deterministic_and_bounded() {
        for voice in VoiceKind::ALL {
            let range = VoiceProfile::for_voice(voice).detune_range_cents;
            for i in 0..500 {
                let a = humanize_detune(voice, i);
                assert_eq!(a, humanize_detune(voice, i));
                assert!(a.abs() <= range + 1e-4, "{voice} {i} {a}");
                assert!(a.is_finite());
            }
        }
    }

    #[test]
    fn test_detune_varies() {
        let values: Vec<f32> = (0..16).map(|i| humanize_detune(VoiceKind::Lab, i)).collect();
        assert!(values.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_precise_voice_is_tighter() {
        let architect = VoiceProfile::for_voice(VoiceKind::Architect);
        let lab = VoiceProfile::for_voice(VoiceKind::Lab);
        assert!(architect.detune_range_cents < lab.detune_range_cents);
        assert!(architect.envelope.release < VoiceProfile::for_voice(VoiceKind::Author).envelope.release);
    }

    #[test]
    fn test_breath_period_in_range() {
        for voice in VoiceKind::ALL {
            let preset = AmbientPreset::for_mode(voice);
            assert!((10.0..=15.0).contains(&preset.breath_period_secs));
            assert!(preset.filter_min_hz < preset.filter_max_hz);
        }
    }
}

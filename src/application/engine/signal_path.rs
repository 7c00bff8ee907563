//! 声明式信号通路
//!
//! 每条通路 = 若干声源（并联）→ 有序处理级（串联）→ 输出，
//! 外加可选的参数调制源。拓扑在这里描述，由 graph_builder 实例化

use crate::application::ports::{NodeSpec, NoiseColor, ParamId};
use crate::domain::audio::{AmbientPreset, Tone, VoiceKind, VoiceProfile};

pub const STAGE_SOURCE: &str = "source";
pub const STAGE_FILTER: &str = "filter";
pub const STAGE_BREATH: &str = "breath";
pub const STAGE_VIBRATO: &str = "vibrato";
pub const STAGE_REVERB: &str = "reverb";
pub const STAGE_LEVEL: &str = "level";

/// 颤音速率（Hz）与深度
const DRONE_VIBRATO_HZ: f32 = 4.5;
const DRONE_VIBRATO_DEPTH: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub label: &'static str,
    pub spec: NodeSpec,
}

impl Stage {
    pub fn new(label: &'static str, spec: NodeSpec) -> Self {
        Self { label, spec }
    }
}

/// 调制：`source` 驱动 `target` 级的 `param`
#[derive(Debug, Clone, PartialEq)]
pub struct Modulation {
    pub source: Stage,
    pub target: &'static str,
    pub param: ParamId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalPath {
    pub name: String,
    pub sources: Vec<Stage>,
    pub chain: Vec<Stage>,
    pub modulations: Vec<Modulation>,
}

impl SignalPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            chain: Vec::new(),
            modulations: Vec::new(),
        }
    }

    pub fn source(mut self, label: &'static str, spec: NodeSpec) -> Self {
        self.sources.push(Stage::new(label, spec));
        self
    }

    pub fn stage(mut self, label: &'static str, spec: NodeSpec) -> Self {
        self.chain.push(Stage::new(label, spec));
        self
    }

    pub fn modulate(
        mut self,
        label: &'static str,
        spec: NodeSpec,
        target: &'static str,
        param: ParamId,
    ) -> Self {
        self.modulations.push(Modulation {
            source: Stage::new(label, spec),
            target,
            param,
        });
        self
    }

    /// 所有级的标签（声源、调制源、处理级）
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sources
            .iter()
            .chain(self.modulations.iter().map(|m| &m.source))
            .chain(self.chain.iter())
            .map(|s| s.label)
    }
}

/// 单级音量总线
pub fn bus(name: &str, gain_db: f32) -> SignalPath {
    SignalPath::new(name).stage(STAGE_LEVEL, NodeSpec::Volume { gain_db })
}

/// 环境声床：粉噪声 → 共振低通（LFO 扫频）→ 音量
pub fn ambient_path(preset: &AmbientPreset, initial_db: f32) -> SignalPath {
    SignalPath::new("ambient")
        .source(
            STAGE_SOURCE,
            NodeSpec::Noise {
                color: NoiseColor::Pink,
            },
        )
        .stage(
            STAGE_FILTER,
            NodeSpec::LowPass {
                cutoff_hz: preset.filter_min_hz,
                q: preset.filter_q,
            },
        )
        .stage(STAGE_LEVEL, NodeSpec::Volume { gain_db: initial_db })
        .modulate(
            STAGE_BREATH,
            NodeSpec::Lfo {
                frequency: 1.0 / preset.breath_period_secs,
                min: preset.filter_min_hz,
                max: preset.filter_max_hz,
            },
            STAGE_FILTER,
            ParamId::Cutoff,
        )
}

/// 持续音：正弦振荡器 → 轻微颤音
pub fn drone_path(name: &str, frequency: f64) -> SignalPath {
    SignalPath::new(name)
        .source(
            STAGE_SOURCE,
            NodeSpec::Oscillator {
                tone: Tone::Sine,
                frequency: frequency as f32,
                detune_cents: 0.0,
            },
        )
        .stage(
            STAGE_VIBRATO,
            NodeSpec::Vibrato {
                frequency: DRONE_VIBRATO_HZ,
                depth: DRONE_VIBRATO_DEPTH,
            },
        )
}

/// UI 声部：合成器 →（低通）→ 混响
pub fn voice_path(voice: VoiceKind, tone: Tone) -> SignalPath {
    let profile = VoiceProfile::for_voice(voice);
    let mut path = SignalPath::new(format!("voice:{voice}")).source(
        STAGE_SOURCE,
        NodeSpec::Synth {
            tone,
            envelope: profile.envelope,
        },
    );
    if let Some(lp) = profile.low_pass {
        path = path.stage(
            STAGE_FILTER,
            NodeSpec::LowPass {
                cutoff_hz: lp.cutoff_hz,
                q: lp.q,
            },
        );
    }
    path.stage(
        STAGE_REVERB,
        NodeSpec::Reverb {
            decay_secs: profile.reverb_decay,
            wet: profile.reverb_wet,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_paths_follow_profiles() {
        let architect = voice_path(VoiceKind::Architect, Tone::Sine);
        assert_eq!(
            architect.labels().collect::<Vec<_>>(),
            vec![STAGE_SOURCE, STAGE_REVERB]
        );

        let lab = voice_path(VoiceKind::Lab, Tone::Square);
        assert_eq!(
            lab.labels().collect::<Vec<_>>(),
            vec![STAGE_SOURCE, STAGE_FILTER, STAGE_REVERB]
        );
        assert!(matches!(
            lab.sources[0].spec,
            NodeSpec::Synth {
                tone: Tone::Square,
                ..
            }
        ));
    }

    #[test]
    fn test_ambient_breath_period() {
        let preset = AmbientPreset::for_mode(VoiceKind::Architect);
        let path = ambient_path(&preset, -80.0);
        let m = &path.modulations[0];
        assert_eq!(m.target, STAGE_FILTER);
        assert_eq!(m.param, ParamId::Cutoff);
        match m.source.spec {
            NodeSpec::Lfo { frequency, min, max } => {
                assert!((1.0 / frequency - preset.breath_period_secs).abs() < 1e-4);
                assert_eq!(min, preset.filter_min_hz);
                assert_eq!(max, preset.filter_max_hz);
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }
}

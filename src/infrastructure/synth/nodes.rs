//! 信号图节点
//!
//! 每个节点 = 参数时间线 + DSP 状态。参数在每个控制块开始时求值一次

use std::collections::HashMap;

use crate::application::ports::{NodeSpec, ParamId};
use crate::domain::audio::{Envelope, Tone};

use super::automation::ParamTimeline;
use super::dsp::{
    adsr, advance_phase, cents_ratio, db_to_gain, waveform, Biquad, DelayLine, NoiseGenerator,
    SchroederReverb,
};

/// 颤音的基础延迟（秒）
const VIBRATO_BASE_DELAY: f32 = 0.005;
/// 单个合成器的最大复音数
const MAX_POLYPHONY: usize = 16;

struct SynthVoice {
    frequency: f32,
    start: f64,
    gate: f64,
    phase: f32,
}

enum Dsp {
    Oscillator { tone: Tone, phase: f32 },
    Noise(NoiseGenerator),
    Lfo { phase: f32 },
    LowPass(Biquad),
    Vibrato { line: DelayLine, phase: f32 },
    Reverb {
        decay_secs: f32,
        engine: Option<SchroederReverb>,
    },
    Volume,
    Synth {
        tone: Tone,
        envelope: Envelope,
        voices: Vec<SynthVoice>,
        last_trigger: Option<f64>,
    },
}

/// 控制块内固定的参数值
#[derive(Default, Clone, Copy)]
struct Controls {
    frequency: f32,
    detune: f32,
    cutoff: f32,
    q: f32,
    gain: f32,
    wet: f32,
    min: f32,
    max: f32,
    depth: f32,
}

pub struct Node {
    kind: &'static str,
    params: HashMap<ParamId, ParamTimeline>,
    /// 被调制源覆盖的参数值（每块刷新）
    overrides: HashMap<ParamId, f32>,
    dsp: Dsp,
    muted: bool,
    start: Option<f64>,
    stop: Option<f64>,
    controls: Controls,
}

impl Node {
    pub fn new(spec: &NodeSpec, sample_rate: f32, seed: u64) -> Self {
        let mut params = HashMap::new();
        let dsp = match *spec {
            NodeSpec::Oscillator {
                tone,
                frequency,
                detune_cents,
            } => {
                params.insert(ParamId::Frequency, ParamTimeline::new(frequency));
                params.insert(ParamId::Detune, ParamTimeline::new(detune_cents));
                Dsp::Oscillator { tone, phase: 0.0 }
            }
            NodeSpec::Noise { color } => Dsp::Noise(NoiseGenerator::new(color, seed)),
            NodeSpec::Lfo {
                frequency,
                min,
                max,
            } => {
                params.insert(ParamId::Frequency, ParamTimeline::new(frequency));
                params.insert(ParamId::Min, ParamTimeline::new(min));
                params.insert(ParamId::Max, ParamTimeline::new(max));
                Dsp::Lfo { phase: 0.0 }
            }
            NodeSpec::LowPass { cutoff_hz, q } => {
                params.insert(ParamId::Cutoff, ParamTimeline::new(cutoff_hz));
                params.insert(ParamId::Q, ParamTimeline::new(q));
                Dsp::LowPass(Biquad::default())
            }
            NodeSpec::Vibrato { frequency, depth } => {
                params.insert(ParamId::Frequency, ParamTimeline::new(frequency));
                params.insert(ParamId::Depth, ParamTimeline::new(depth));
                let size = (VIBRATO_BASE_DELAY * 2.0 * sample_rate) as usize + 4;
                Dsp::Vibrato {
                    line: DelayLine::new(size),
                    phase: 0.0,
                }
            }
            NodeSpec::Reverb { decay_secs, wet } => {
                params.insert(ParamId::Wet, ParamTimeline::new(wet));
                Dsp::Reverb {
                    decay_secs,
                    engine: None,
                }
            }
            NodeSpec::Volume { gain_db } => {
                params.insert(ParamId::GainDb, ParamTimeline::new(gain_db));
                Dsp::Volume
            }
            NodeSpec::Synth { tone, envelope } => Dsp::Synth {
                tone,
                envelope,
                voices: Vec::new(),
                last_trigger: None,
            },
        };

        Self {
            kind: spec.kind(),
            params,
            overrides: HashMap::new(),
            dsp,
            muted: false,
            start: None,
            stop: None,
            controls: Controls::default(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_source(&self) -> bool {
        matches!(self.dsp, Dsp::Oscillator { .. } | Dsp::Noise(_) | Dsp::Lfo { .. })
    }

    pub fn supports(&self, param: ParamId) -> bool {
        self.params.contains_key(&param)
    }

    pub fn param_mut(&mut self, param: ParamId) -> Option<&mut ParamTimeline> {
        self.params.get_mut(&param)
    }

    pub fn param_value(&self, param: ParamId, t: f64) -> Option<f32> {
        if let Some(v) = self.overrides.get(&param) {
            return Some(*v);
        }
        self.params.get(&param).map(|p| p.value_at(t))
    }

    pub fn set_override(&mut self, param: ParamId, value: Option<f32>) {
        match value {
            Some(v) => {
                self.overrides.insert(param, v);
            }
            None => {
                self.overrides.remove(&param);
            }
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn schedule_start(&mut self, at: f64) {
        self.start = Some(at);
        self.stop = None;
    }

    pub fn schedule_stop(&mut self, at: f64) {
        if self.start.is_some() {
            self.stop = Some(at);
        }
    }

    pub fn is_active(&self, t: f64) -> bool {
        match &self.dsp {
            Dsp::Synth { voices, envelope, .. } => voices
                .iter()
                .any(|v| t >= v.start && t < v.start + v.gate + envelope.release as f64),
            _ => match self.start {
                Some(start) => t >= start && self.stop.map_or(true, |stop| t < stop),
                None => false,
            },
        }
    }

    /// 切换波形；只对振荡器和合成器有效
    pub fn set_tone(&mut self, new_tone: Tone) -> bool {
        match &mut self.dsp {
            Dsp::Oscillator { tone, .. } | Dsp::Synth { tone, .. } => {
                *tone = new_tone;
                true
            }
            _ => false,
        }
    }

    pub fn is_synth(&self) -> bool {
        matches!(self.dsp, Dsp::Synth { .. })
    }

    pub fn last_trigger(&self) -> Option<f64> {
        match &self.dsp {
            Dsp::Synth { last_trigger, .. } => *last_trigger,
            _ => None,
        }
    }

    /// 调度一个音符；调用方负责单调性检查
    pub fn trigger(&mut self, frequency: f32, gate: f64, at: f64) {
        if let Dsp::Synth {
            voices,
            last_trigger,
            ..
        } = &mut self.dsp
        {
            if voices.len() >= MAX_POLYPHONY {
                voices.remove(0);
            }
            voices.push(SynthVoice {
                frequency,
                start: at,
                gate,
                phase: 0.0,
            });
            *last_trigger = Some(at);
        }
    }

    /// 预计算混响；其他节点无事可做
    pub fn prepare(&mut self, sample_rate: f32) {
        if let Dsp::Reverb { decay_secs, engine } = &mut self.dsp {
            *engine = Some(SchroederReverb::tuned(*decay_secs, sample_rate));
        }
    }

    pub fn is_prepared(&self) -> bool {
        match &self.dsp {
            Dsp::Reverb { engine, .. } => engine.is_some(),
            _ => true,
        }
    }

    /// 控制块开始：求值参数、清理结束的音符和自动化事件
    pub fn begin_block(&mut self, t: f64, sample_rate: f32) {
        for p in self.params.values_mut() {
            p.prune(t);
        }
        let value = |id: ParamId| self.param_value(id, t).unwrap_or_default();
        let controls = Controls {
            frequency: value(ParamId::Frequency),
            detune: value(ParamId::Detune),
            cutoff: value(ParamId::Cutoff),
            q: value(ParamId::Q),
            gain: db_to_gain(value(ParamId::GainDb)),
            wet: value(ParamId::Wet).clamp(0.0, 1.0),
            min: value(ParamId::Min),
            max: value(ParamId::Max),
            depth: value(ParamId::Depth).clamp(0.0, 1.0),
        };
        self.controls = controls;

        match &mut self.dsp {
            Dsp::LowPass(biquad) => biquad.set_lowpass(controls.cutoff, controls.q, sample_rate),
            Dsp::Synth {
                voices, envelope, ..
            } => {
                let release = envelope.release as f64;
                voices.retain(|v| t < v.start + v.gate + release);
            }
            _ => {}
        }
    }

    /// 处理一个样本
    pub fn process(&mut self, input: f32, t: f64, sample_rate: f32) -> f32 {
        let c = self.controls;
        let active = self.is_active(t);
        match &mut self.dsp {
            Dsp::Oscillator { tone, phase } => {
                if !active {
                    return 0.0;
                }
                let out = waveform(*tone, *phase);
                *phase = advance_phase(*phase, c.frequency * cents_ratio(c.detune), sample_rate);
                out
            }
            Dsp::Noise(noise) => {
                if active {
                    noise.next()
                } else {
                    0.0
                }
            }
            Dsp::Lfo { phase } => {
                if !active {
                    return c.min;
                }
                let unit = (waveform(Tone::Sine, *phase) + 1.0) * 0.5;
                *phase = advance_phase(*phase, c.frequency, sample_rate);
                c.min + (c.max - c.min) * unit
            }
            Dsp::LowPass(biquad) => biquad.process(input),
            Dsp::Vibrato { line, phase } => {
                line.write(input);
                let base = VIBRATO_BASE_DELAY * sample_rate;
                let delay = base * (1.0 + c.depth * waveform(Tone::Sine, *phase));
                *phase = advance_phase(*phase, c.frequency, sample_rate);
                line.read(delay)
            }
            Dsp::Reverb { engine, .. } => match engine {
                Some(reverb) => input * (1.0 - c.wet) + reverb.process(input) * c.wet,
                None => input,
            },
            Dsp::Volume => {
                if self.muted {
                    0.0
                } else {
                    input * c.gain
                }
            }
            Dsp::Synth {
                tone,
                envelope,
                voices,
                ..
            } => {
                let mut out = 0.0;
                for v in voices.iter_mut() {
                    let local = t - v.start;
                    if local < 0.0 {
                        continue;
                    }
                    let level = adsr(envelope, local as f32, v.gate as f32);
                    out += waveform(*tone, v.phase) * level;
                    v.phase = advance_phase(v.phase, v.frequency, sample_rate);
                }
                out * 0.3
            }
        }
    }

    /// 上一块开始时的有效值（调制源用）
    pub fn modulation_output(&self, t: f64) -> Option<f32> {
        match &self.dsp {
            Dsp::Lfo { phase } if self.is_active(t) => {
                let unit = (waveform(Tone::Sine, *phase) + 1.0) * 0.5;
                Some(self.controls.min + (self.controls.max - self.controls.min) * unit)
            }
            Dsp::Oscillator { tone, phase } if self.is_active(t) => Some(waveform(*tone, *phase)),
            _ => None,
        }
    }

    pub fn sounding_voices(&self) -> usize {
        match &self.dsp {
            Dsp::Synth { voices, .. } => voices.len(),
            _ => 0,
        }
    }

    pub fn tone(&self) -> Option<Tone> {
        match &self.dsp {
            Dsp::Oscillator { tone, .. } | Dsp::Synth { tone, .. } => Some(*tone),
            _ => None,
        }
    }
}

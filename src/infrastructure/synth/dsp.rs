//! DSP 基础单元
//!
//! 逐样本处理，音频线程内不做堆分配（缓冲区在构造 / prepare 时分配）

use std::f32::consts::PI;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::application::ports::NoiseColor;
use crate::domain::audio::{Envelope, Tone};

/// 低于该电平视为静音
pub const SILENCE_FLOOR_DB: f32 = -80.0;

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    if db <= SILENCE_FLOOR_DB {
        0.0
    } else {
        10f32.powf(db / 20.0)
    }
}

/// 音分 → 频率倍数
#[inline]
pub fn cents_ratio(cents: f32) -> f32 {
    2f32.powf(cents / 1200.0)
}

/// 单周期波形，`phase` ∈ [0, 1)
#[inline]
pub fn waveform(tone: Tone, phase: f32) -> f32 {
    match tone {
        Tone::Sine => (2.0 * PI * phase).sin(),
        Tone::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        Tone::Sawtooth => 2.0 * phase - 1.0,
        Tone::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// 相位累加，返回新的相位
#[inline]
pub fn advance_phase(phase: f32, frequency: f32, sample_rate: f32) -> f32 {
    let next = phase + frequency / sample_rate;
    next - next.floor()
}

// --------- noise ---------

/// 彩色噪声源
///
/// 粉噪声使用 Paul Kellet 的经济型滤波器，棕噪声是带泄漏的积分
pub struct NoiseGenerator {
    color: NoiseColor,
    rng: Pcg32,
    pink: [f32; 7],
    brown: f32,
}

impl NoiseGenerator {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Self {
            color,
            rng: Pcg32::seed_from_u64(seed),
            pink: [0.0; 7],
            brown: 0.0,
        }
    }

    pub fn next(&mut self) -> f32 {
        let white: f32 = self.rng.random::<f32>() * 2.0 - 1.0;
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                let b = &mut self.pink;
                b[0] = 0.99886 * b[0] + white * 0.0555179;
                b[1] = 0.99332 * b[1] + white * 0.0750759;
                b[2] = 0.96900 * b[2] + white * 0.1538520;
                b[3] = 0.86650 * b[3] + white * 0.3104856;
                b[4] = 0.55000 * b[4] + white * 0.5329522;
                b[5] = -0.7616 * b[5] - white * 0.0168980;
                let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
                b[6] = white * 0.115926;
                out * 0.11
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + 0.02 * white) / 1.02;
                self.brown * 3.5
            }
        }
    }
}

// --------- filters ---------

#[derive(Clone, Copy, Debug)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }
}

impl Biquad {
    /// RBJ 低通系数
    pub fn set_lowpass(&mut self, cutoff_hz: f32, q: f32, sample_rate: f32) {
        let f = cutoff_hz.clamp(20.0, sample_rate * 0.45) / sample_rate;
        let w0 = 2.0 * PI * f;
        let alpha = w0.sin() / (2.0 * q.max(0.001));
        let cos_w0 = w0.cos();

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;
        let b2 = b0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    pub fn process(&mut self, x: f32) -> f32 {
        // transposed direct form ii
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

// --------- delay based ---------

/// 分数延迟线（线性插值读取）
pub struct DelayLine {
    buf: Vec<f32>,
    idx: usize,
}

impl DelayLine {
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0.0; size.max(2)],
            idx: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn write(&mut self, x: f32) {
        self.buf[self.idx] = x;
        self.idx = (self.idx + 1) % self.buf.len();
    }

    /// 读取 `delay` 个样本之前写入的值
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buf.len();
        let delay = delay.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;
        let a = self.buf[(self.idx + len - whole) % len];
        let b = self.buf[(self.idx + len - whole - 1) % len];
        a + (b - a) * frac
    }
}

pub struct Comb {
    buf: Vec<f32>,
    idx: usize,
    feedback: f32,
    damp: f32,
    store: f32,
}

impl Comb {
    pub fn new(size: usize, feedback: f32) -> Self {
        Self {
            buf: vec![0.0; size.max(1)],
            idx: 0,
            feedback: feedback.clamp(0.0, 0.98),
            damp: 0.2,
            store: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.buf[self.idx];
        self.store = y * (1.0 - self.damp) + self.store * self.damp;
        self.buf[self.idx] = x + self.store * self.feedback;
        self.idx += 1;
        if self.idx >= self.buf.len() {
            self.idx = 0;
        }
        y
    }
}

pub struct AllPass {
    buf: Vec<f32>,
    idx: usize,
    gain: f32,
}

impl AllPass {
    pub fn new(size: usize, gain: f32) -> Self {
        Self {
            buf: vec![0.0; size.max(1)],
            idx: 0,
            gain,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let delayed = self.buf[self.idx];
        let y = delayed - self.gain * x;
        self.buf[self.idx] = x + self.gain * delayed;
        self.idx += 1;
        if self.idx >= self.buf.len() {
            self.idx = 0;
        }
        y
    }
}

/// Schroeder 混响：4 个并联梳状 + 2 个串联全通
pub struct SchroederReverb {
    combs: Vec<Comb>,
    allpasses: Vec<AllPass>,
}

const COMB_TIMES: [f32; 4] = [0.0297, 0.0371, 0.0411, 0.0437];
const ALLPASS_TIMES: [f32; 2] = [0.005, 0.0017];

impl SchroederReverb {
    /// 按 RT60 衰减时间计算每个梳状滤波器的反馈
    pub fn tuned(decay_secs: f32, sample_rate: f32) -> Self {
        let decay = decay_secs.max(0.05);
        let combs = COMB_TIMES
            .iter()
            .map(|&t| {
                let feedback = 10f32.powf(-3.0 * t / decay);
                Comb::new((t * sample_rate) as usize, feedback)
            })
            .collect();
        let allpasses = ALLPASS_TIMES
            .iter()
            .map(|&t| AllPass::new((t * sample_rate) as usize, 0.7))
            .collect();
        Self { combs, allpasses }
    }

    /// 返回纯湿声
    pub fn process(&mut self, x: f32) -> f32 {
        let mut y = self.combs.iter_mut().map(|c| c.process(x)).sum::<f32>() * 0.25;
        for ap in &mut self.allpasses {
            y = ap.process(y);
        }
        y
    }
}

// --------- envelope ---------

/// 线性 ADSR，`gate` 秒后进入 release
pub fn adsr(env: &Envelope, t: f32, gate: f32) -> f32 {
    let attack = env.attack.max(1e-4);
    let decay = env.decay.max(1e-4);
    let level_at = |t: f32| {
        if t < attack {
            t / attack
        } else if t < attack + decay {
            1.0 - (1.0 - env.sustain) * ((t - attack) / decay)
        } else {
            env.sustain
        }
    };

    if t < 0.0 {
        0.0
    } else if t < gate {
        level_at(t)
    } else {
        let release = env.release.max(1e-4);
        let from = level_at(gate);
        (from * (1.0 - (t - gate) / release)).max(0.0)
    }
}

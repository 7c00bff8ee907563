//! Audio Backend Port - 合成 API 抽象
//!
//! 引擎只通过这个接口操作信号图；具体实现在 infrastructure/synth

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::audio::{Envelope, Tone};

/// Audio Backend 错误
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Audio context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Unsupported parameter {param:?} on node {node}")]
    UnsupportedParam { node: NodeId, param: ParamId },

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Start time {requested:.6}s must be greater than previous {last:.6}s")]
    NonMonotonicTime { requested: f64, last: f64 },
}

/// 信号图节点 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 噪声颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

/// 节点描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeSpec {
    /// 持续振荡器
    Oscillator {
        tone: Tone,
        frequency: f32,
        detune_cents: f32,
    },
    /// 噪声源
    Noise { color: NoiseColor },
    /// 低频调制源，输出在 [min, max] 之间
    Lfo { frequency: f32, min: f32, max: f32 },
    /// 低通滤波
    LowPass { cutoff_hz: f32, q: f32 },
    /// 音高颤音（调制延迟）
    Vibrato { frequency: f32, depth: f32 },
    /// 混响（需 `prepare`）
    Reverb { decay_secs: f32, wet: f32 },
    /// 音量级（dB）
    Volume { gain_db: f32 },
    /// 复音包络合成器
    Synth { tone: Tone, envelope: Envelope },
}

impl NodeSpec {
    /// 是否为需要 start/stop 的声源
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            NodeSpec::Oscillator { .. } | NodeSpec::Noise { .. } | NodeSpec::Lfo { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodeSpec::Oscillator { .. } => "oscillator",
            NodeSpec::Noise { .. } => "noise",
            NodeSpec::Lfo { .. } => "lfo",
            NodeSpec::LowPass { .. } => "lowpass",
            NodeSpec::Vibrato { .. } => "vibrato",
            NodeSpec::Reverb { .. } => "reverb",
            NodeSpec::Volume { .. } => "volume",
            NodeSpec::Synth { .. } => "synth",
        }
    }
}

/// 可自动化的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParamId {
    Frequency,
    Detune,
    Cutoff,
    Q,
    GainDb,
    Wet,
    Min,
    Max,
    Depth,
}

/// 合成后端
///
/// 时间单位为秒，以后端自身的采样时钟 (`now`) 为准
#[async_trait]
pub trait AudioBackendPort: Send + Sync {
    /// 启动音频上下文（需要用户手势）
    async fn resume(&self) -> Result<(), BackendError>;

    /// 当前时间（秒）
    fn now(&self) -> f64;

    /// 创建节点
    fn create(&self, spec: NodeSpec) -> Result<NodeId, BackendError>;

    /// 预计算（如混响冲激响应）
    async fn prepare(&self, node: NodeId) -> Result<(), BackendError>;

    /// 连接音频信号；`to == None` 表示连接到最终输出
    fn connect(&self, from: NodeId, to: Option<NodeId>) -> Result<(), BackendError>;

    /// 用调制源驱动目标参数
    fn modulate(&self, source: NodeId, target: NodeId, param: ParamId)
        -> Result<(), BackendError>;

    fn start(&self, node: NodeId, at: f64) -> Result<(), BackendError>;

    fn stop(&self, node: NodeId, at: f64) -> Result<(), BackendError>;

    /// 在 `at` 时刻立即设置参数
    fn set_param(&self, node: NodeId, param: ParamId, value: f32, at: f64)
        -> Result<(), BackendError>;

    /// 从 `at` 时刻的当前值线性过渡到 `target`
    fn ramp_param(
        &self,
        node: NodeId,
        param: ParamId,
        target: f32,
        at: f64,
        duration: f64,
    ) -> Result<(), BackendError>;

    /// 切换波形（振荡器 / 合成器）
    fn set_tone(&self, node: NodeId, tone: Tone) -> Result<(), BackendError>;

    /// 静音 / 取消静音音量级
    fn set_muted(&self, node: NodeId, muted: bool) -> Result<(), BackendError>;

    /// 触发合成器音符
    ///
    /// 同一合成器的触发时间必须严格递增，否则返回 `NonMonotonicTime`
    fn trigger(
        &self,
        synth: NodeId,
        frequency: f32,
        detune_cents: f32,
        gate: f64,
        at: f64,
    ) -> Result<(), BackendError>;

    /// 参数当前值
    fn param_value(&self, node: NodeId, param: ParamId) -> Option<f32>;

    /// 声源当前是否在发声
    fn is_active(&self, node: NodeId) -> bool;

    /// 释放节点（同时断开所有连接）
    fn dispose(&self, node: NodeId);

    /// 现存节点数
    fn node_count(&self) -> usize;
}

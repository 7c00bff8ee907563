//! 软件合成
//!
//! - software_backend: AudioBackendPort 的软件实现
//! - driver: 实时渲染循环 + 输出目标
//! - wav: PCM16 WAV 编码

mod automation;
mod driver;
pub mod dsp;
mod nodes;
mod software_backend;
pub mod wav;

pub use driver::{AudioSink, NullSink, OutputDriver, WavFileSink};
pub use software_backend::{SoftwareBackend, CONTROL_BLOCK, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod playback;
pub mod textgen;
pub mod tts;

pub use playback::MixerSpeechPlayer;
pub use textgen::{HttpTextGenerator, HttpTextGeneratorConfig};
pub use tts::*;

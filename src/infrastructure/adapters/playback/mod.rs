//! Playback Adapter - 语音播放实现

mod decoder;
mod mixer_player;

pub use decoder::{decode_speech, resample, DecodedSpeech};
pub use mixer_player::MixerSpeechPlayer;

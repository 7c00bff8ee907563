//! 语音解码 - 基于 symphonia
//!
//! 任意受支持的容器（WAV / MP3）→ 单声道 f32 → 目标采样率

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::PlaybackError;

/// 解码后的单声道 PCM
#[derive(Debug, Clone)]
pub struct DecodedSpeech {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedSpeech {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

fn decode_err(message: impl Into<String>) -> PlaybackError {
    PlaybackError::Decode(message.into())
}

/// 解码并混成单声道
pub fn decode_speech(data: &[u8]) -> Result<DecodedSpeech, PlaybackError> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_err(format!("Probe failed: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| decode_err("No audio track found"))?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| decode_err("Unknown sample rate"))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err(format!("Decoder creation failed: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(decode_err(format!("Packet read error: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "Decode error (skipping packet)");
                continue;
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let frames = decoded.frames();
        let mut buf = SampleBuffer::<f32>::new(frames as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend(
            buf.samples()[..frames * channels]
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    Ok(DecodedSpeech {
        samples,
        sample_rate,
    })
}

/// 线性插值重采样（单声道）
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let last = samples.len() - 1;

    (0..new_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let s0 = samples[idx];
            let s1 = samples[(idx + 1).min(last)];
            s0 + (s1 - s0) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::synth::wav::encode_wav;

    #[test]
    fn test_decode_wav() {
        let tone: Vec<f32> = (0..1600).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        let wav = encode_wav(&tone, 16_000);

        let decoded = decode_speech(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.samples.len(), 1600);
        assert!((decoded.duration_secs() - 0.1).abs() < 1e-9);
        // PCM16 量化误差
        assert!((decoded.samples[100] - tone[100]).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_speech(b"definitely not audio").unwrap_err();
        assert!(matches!(err, PlaybackError::Decode(_)));
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = resample(&input, 16_000, 8_000);
        assert_eq!(out.len(), 50);
        assert_eq!(out[10], 20.0);
        assert_eq!(resample(&input, 8_000, 8_000), input);
    }
}

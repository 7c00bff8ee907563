//! Fake TTS Client - 离线 TTS
//!
//! 不调用外部服务，生成一段与文本长度相称的合成 WAV

use async_trait::async_trait;
use std::f32::consts::TAU;
use std::time::Duration;

use crate::application::ports::{InferRequest, InferResponse, TtsEnginePort, TtsError};
use crate::infrastructure::synth::wav::encode_wav;

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    pub sample_rate: u32,
    /// 每个字符的时长（毫秒）
    pub ms_per_char: u64,
    /// 单句最长时长（毫秒）
    pub max_duration_ms: u64,
    /// 模拟推理延迟
    pub latency: Duration,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            ms_per_char: 45,
            max_duration_ms: 6_000,
            latency: Duration::from_millis(200),
        }
    }
}

/// Fake TTS Client
///
/// 音高由 voice_id 决定，时长由文本长度决定
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(sample_rate = config.sample_rate, "FakeTtsClient initialized");
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    fn pitch_for(voice_id: &str) -> f32 {
        let digest = md5::compute(voice_id.as_bytes());
        140.0 + digest.0[0] as f32
    }

    fn render(&self, text: &str, voice_id: &str) -> Vec<u8> {
        let chars = text.chars().count().max(1) as u64;
        let duration_ms = (chars * self.config.ms_per_char).min(self.config.max_duration_ms);
        let sr = self.config.sample_rate.max(1);
        let n = (sr as u64 * duration_ms / 1000) as usize;
        let pitch = Self::pitch_for(voice_id);

        // 带慢速起伏的正弦，首尾各 20ms 淡入淡出
        let fade = (sr as usize / 50).max(1);
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32 / sr as f32;
                let contour = 1.0 + 0.05 * (TAU * 3.0 * t).sin();
                let edge = (i.min(n - 1 - i) as f32 / fade as f32).min(1.0);
                (TAU * pitch * contour * t).sin() * 0.3 * edge
            })
            .collect();
        encode_wav(&samples, sr)
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn infer(&self, request: InferRequest) -> Result<InferResponse, TtsError> {
        tracing::debug!(
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            "FakeTtsClient: synthesizing placeholder audio"
        );

        tokio::time::sleep(self.config.latency).await;

        Ok(InferResponse {
            audio_data: self.render(&request.text, &request.voice_id),
            content_type: Some("audio/wav".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duration_follows_text_length() {
        let client = FakeTtsClient::new(FakeTtsClientConfig {
            sample_rate: 8_000,
            ms_per_char: 10,
            max_duration_ms: 1_000,
            latency: Duration::ZERO,
        });

        let short = client
            .infer(InferRequest {
                text: "hello".into(),
                voice_id: "v1".into(),
            })
            .await
            .unwrap();
        // 5 字符 × 10ms = 50ms = 400 样本
        assert_eq!(short.audio_data.len(), 44 + 400 * 2);
        assert_eq!(short.content_type.as_deref(), Some("audio/wav"));

        let long = client
            .infer(InferRequest {
                text: "x".repeat(500),
                voice_id: "v1".into(),
            })
            .await
            .unwrap();
        assert_eq!(long.audio_data.len(), 44 + 8_000 * 2);
    }

    #[test]
    fn test_pitch_is_stable_per_voice() {
        assert_eq!(
            FakeTtsClient::pitch_for("velvet"),
            FakeTtsClient::pitch_for("velvet")
        );
    }
}

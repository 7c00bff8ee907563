//! Mixer Speech Player - 通过软件后端的语音通道播放
//!
//! 语音在主总线之后混入，不受静音与 ducking 影响

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

use super::decoder::{decode_speech, resample};
use crate::application::ports::{PlaybackError, SpeechPlayerPort};
use crate::infrastructure::synth::SoftwareBackend;

/// 超过语音时长多久仍未结束视为输出卡住
const COMPLETION_GRACE: Duration = Duration::from_secs(2);

pub struct MixerSpeechPlayer {
    backend: Arc<SoftwareBackend>,
    gain: f32,
    current: Mutex<Option<u64>>,
    /// 每次 `stop` 递增，解码期间被停止的语音不再开始播放
    stop_epoch: AtomicU64,
}

impl MixerSpeechPlayer {
    pub fn new(backend: Arc<SoftwareBackend>, gain: f32) -> Self {
        Self {
            backend,
            gain,
            current: Mutex::new(None),
            stop_epoch: AtomicU64::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn current(&self) -> MutexGuard<'_, Option<u64>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SpeechPlayerPort for MixerSpeechPlayer {
    async fn play(&self, audio_data: Vec<u8>) -> Result<(), PlaybackError> {
        if !self.backend.is_running() {
            return Err(PlaybackError::Output("audio context not running".to_string()));
        }

        let epoch = self.stop_epoch.load(Ordering::SeqCst);
        let target_rate = self.backend.sample_rate();
        let gain = self.gain;
        let samples = tokio::task::spawn_blocking(move || {
            decode_speech(&audio_data).map(|decoded| {
                let mut samples = resample(&decoded.samples, decoded.sample_rate, target_rate);
                samples.iter_mut().for_each(|s| *s *= gain);
                samples
            })
        })
        .await
        .map_err(|e| PlaybackError::Decode(format!("decode task failed: {}", e)))??;

        let duration = Duration::from_secs_f64(samples.len() as f64 / target_rate.max(1) as f64);
        let (done, finished) = oneshot::channel();
        let id = {
            let mut current = self.current();
            if self.stop_epoch.load(Ordering::SeqCst) != epoch {
                tracing::debug!("Speech stopped while decoding, clip dropped");
                return Err(PlaybackError::Interrupted);
            }
            let id = self.backend.play_clip(samples, done);
            *current = Some(id);
            id
        };
        tracing::debug!(clip = id, duration_ms = duration.as_millis() as u64, "Speech clip started");

        let outcome = tokio::time::timeout(duration + COMPLETION_GRACE, finished).await;
        {
            let mut current = self.current();
            if *current == Some(id) {
                *current = None;
            }
        }

        match outcome {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(PlaybackError::Interrupted),
            Ok(Err(_)) => Err(PlaybackError::Output("mixer dropped the clip".to_string())),
            Err(_) => {
                self.backend.stop_clip(id);
                Err(PlaybackError::Output("speech clip did not finish".to_string()))
            }
        }
    }

    fn stop(&self) {
        let mut current = self.current();
        self.stop_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = current.take() {
            self.backend.stop_clip(id);
            tracing::debug!(clip = id, "Speech clip stopped");
        }
    }
}

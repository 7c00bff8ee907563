//! Output Driver - 实时渲染循环
//!
//! 按块时长定时渲染后端，写入一个 `AudioSink`

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::software_backend::SoftwareBackend;
use super::wav::WavWriter;

/// 渲染输出目标
pub trait AudioSink: Send {
    fn write(&mut self, block: &[f32]) -> std::io::Result<()>;

    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// 丢弃所有样本（只推进时钟）
#[derive(Debug, Default)]
pub struct NullSink {
    frames: u64,
}

impl NullSink {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl AudioSink for NullSink {
    fn write(&mut self, block: &[f32]) -> std::io::Result<()> {
        self.frames += block.len() as u64;
        Ok(())
    }
}

/// 录制到 WAV 文件
pub struct WavFileSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavFileSink {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(&path)?);
        Ok(Self {
            path,
            writer: Some(WavWriter::new(file, sample_rate)?),
        })
    }
}

impl AudioSink for WavFileSink {
    fn write(&mut self, block: &[f32]) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.write_samples(block),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> std::io::Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
            tracing::info!(path = %self.path.display(), "Recording finalized");
        }
        Ok(())
    }
}

/// 实时渲染驱动
pub struct OutputDriver {
    backend: Arc<SoftwareBackend>,
    sink: Box<dyn AudioSink>,
    block_size: usize,
    cancel: CancellationToken,
}

impl OutputDriver {
    pub fn new(
        backend: Arc<SoftwareBackend>,
        sink: Box<dyn AudioSink>,
        block_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            sink,
            block_size: block_size.max(1),
            cancel,
        }
    }

    /// 渲染一块并写入 sink
    pub fn pump(&mut self, buf: &mut [f32]) -> std::io::Result<()> {
        self.backend.render(buf);
        if self.backend.is_running() {
            self.sink.write(buf)?;
        }
        Ok(())
    }

    /// 启动驱动循环，直到取消
    pub async fn run(mut self) {
        let sample_rate = self.backend.sample_rate().max(1);
        let period = Duration::from_secs_f64(self.block_size as f64 / sample_rate as f64);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut buf = vec![0.0f32; self.block_size];

        tracing::info!(
            sample_rate,
            block_size = self.block_size,
            "OutputDriver started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.pump(&mut buf) {
                        tracing::error!(error = %e, "Audio sink write failed, stopping driver");
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.sink.finish() {
            tracing::warn!(error = %e, "Failed to finalize audio sink");
        }
        tracing::info!("OutputDriver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::AudioBackendPort;

    #[tokio::test]
    async fn test_pump_advances_clock() {
        let backend = SoftwareBackend::new(8_000).arc();
        backend.resume().await.unwrap();
        let mut driver = OutputDriver::new(
            backend.clone(),
            Box::new(NullSink::default()),
            80,
            CancellationToken::new(),
        );
        let mut buf = vec![0.0; 80];
        for _ in 0..10 {
            driver.pump(&mut buf).unwrap();
        }
        assert!((backend.now() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wav_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/render.wav");
        let backend = SoftwareBackend::new(8_000).arc();
        backend.resume().await.unwrap();

        let sink = WavFileSink::create(&path, 8_000).unwrap();
        let cancel = CancellationToken::new();
        let mut driver = OutputDriver::new(backend, Box::new(sink), 100, cancel.clone());
        let mut buf = vec![0.0; 100];
        driver.pump(&mut buf).unwrap();
        driver.pump(&mut buf).unwrap();

        cancel.cancel();
        driver.run().await;

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44 + 200 * 2);
    }
}

//! Worker Layer - Background Task Processing
//!
//! 实现 WhisperWorker，周期性产生并推送片段

mod whisper_worker;

pub use whisper_worker::{WhisperWorker, WhisperWorkerConfig};

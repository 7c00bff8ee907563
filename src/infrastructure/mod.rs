//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod http;
pub mod persistence;
pub mod synth;
pub mod worker;

pub use events::{EventPublisher, WsEvent};
pub use synth::{OutputDriver, SoftwareBackend};
pub use worker::{WhisperWorker, WhisperWorkerConfig};

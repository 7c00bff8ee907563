//! Events - WebSocket 事件广播

mod publisher;

pub use publisher::{EventPublisher, WsEvent};

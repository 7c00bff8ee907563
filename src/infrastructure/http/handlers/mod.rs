//! HTTP Handlers

mod audio;
mod ping;
mod soundscape;
mod voice;
mod websocket;
mod whisper;

pub use audio::*;
pub use ping::*;
pub use soundscape::*;
pub use voice::*;
pub use websocket::*;
pub use whisper::*;

//! Text Generation Adapter

mod http_text_generator;

pub use http_text_generator::{HttpTextGenerator, HttpTextGeneratorConfig};

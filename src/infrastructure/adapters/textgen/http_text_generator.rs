//! HTTP Text Generator - 调用外部文本生成服务
//!
//! POST {base_url}/api/whisper/generate
//! Request: WhisperPrompt (JSON)
//! Response: {"text": "...", "mood": "mysterious"}

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::application::ports::{
    GeneratedWhisper, TextGenError, TextGeneratorPort, WhisperPrompt,
};
use crate::domain::whisper::Mood;

/// 生成结果的最大长度（字符）
const MAX_WHISPER_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
    #[serde(default)]
    mood: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpTextGeneratorConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpTextGeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout_secs: 10,
        }
    }
}

pub struct HttpTextGenerator {
    client: Client,
    config: HttpTextGeneratorConfig,
}

impl HttpTextGenerator {
    pub fn new(config: HttpTextGeneratorConfig) -> Result<Self, TextGenError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TextGenError::NetworkError(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/api/whisper/generate",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// 校验并规范化服务返回
fn into_whisper(response: GenerateResponse) -> Result<GeneratedWhisper, TextGenError> {
    let text = response.text.trim();
    if text.is_empty() {
        return Err(TextGenError::InvalidResponse("empty text".to_string()));
    }
    if text.chars().count() > MAX_WHISPER_CHARS {
        return Err(TextGenError::InvalidResponse(format!(
            "text longer than {} characters",
            MAX_WHISPER_CHARS
        )));
    }
    let mood = response
        .mood
        .as_deref()
        .and_then(|m| m.parse::<Mood>().ok())
        .unwrap_or(Mood::Contemplative);
    Ok(GeneratedWhisper {
        text: text.to_string(),
        mood,
    })
}

#[async_trait]
impl TextGeneratorPort for HttpTextGenerator {
    async fn generate(&self, prompt: WhisperPrompt) -> Result<GeneratedWhisper, TextGenError> {
        tracing::debug!(url = %self.generate_url(), mode = %prompt.mode, "Requesting whisper");

        let response = self
            .client
            .post(self.generate_url())
            .json(&prompt)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TextGenError::Timeout
                } else {
                    TextGenError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TextGenError::ServiceError(format!("HTTP {}: {}", status, body)));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TextGenError::InvalidResponse(e.to_string()))?;
        into_whisper(body)
    }
}

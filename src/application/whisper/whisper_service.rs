//! Whisper Service
//!
//! 持有选择器与当前情境；按概率尝试 AI 生成，任何失败都回退到内置片段

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::error::ApplicationError;
use crate::application::ports::{TextGeneratorPort, WhisperPrompt};
use crate::domain::audio::PresentationMode;
use crate::domain::whisper::{
    Mood, TimeOfDay, Whisper, WhisperContext, WhisperSelector, WhisperSource,
};

/// 回声片段的最大长度（字符）
pub const MAX_ECHO_CHARS: usize = 280;

#[derive(Debug, Clone)]
pub struct WhisperServiceConfig {
    /// 每次尝试 AI 生成的概率 [0, 1]
    pub ai_probability: f64,
    /// 记住的屏幕片段数（作为 AI 提示）
    pub max_on_screen: usize,
    /// 固定随机种子
    pub seed: Option<u64>,
}

impl Default for WhisperServiceConfig {
    fn default() -> Self {
        Self {
            ai_probability: 0.3,
            max_on_screen: 6,
            seed: None,
        }
    }
}

struct ServiceState {
    selector: WhisperSelector,
    context: WhisperContext,
    rng: Pcg64,
    on_screen: VecDeque<String>,
}

pub struct WhisperService {
    config: WhisperServiceConfig,
    generator: Option<Arc<dyn TextGeneratorPort>>,
    state: Mutex<ServiceState>,
    started_at: DateTime<Utc>,
}

impl WhisperService {
    pub fn new(
        config: WhisperServiceConfig,
        mode: PresentationMode,
        generator: Option<Arc<dyn TextGeneratorPort>>,
    ) -> Self {
        let (selector, rng) = match config.seed {
            Some(seed) => (
                WhisperSelector::with_seed(seed),
                Pcg64::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (WhisperSelector::new(), Pcg64::seed_from_u64(rand::random())),
        };
        Self {
            config,
            generator,
            state: Mutex::new(ServiceState {
                selector,
                context: WhisperContext::new(mode, TimeOfDay::now()),
                rng,
                on_screen: VecDeque::new(),
            }),
            started_at: Utc::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// 产生下一个片段
    pub async fn next_whisper(&self) -> Whisper {
        let prompt = {
            let mut state = self.lock();
            state.context.session_duration = Some(self.session_secs());
            let roll: f64 = state.rng.random();
            match &self.generator {
                Some(_) if roll < self.config.ai_probability => Some(WhisperPrompt {
                    mode: state.context.mode,
                    time_of_day: state.context.time_of_day,
                    user_intent: state.context.user_intent.clone(),
                    session_duration: state.context.session_duration,
                    existing: state.on_screen.iter().cloned().collect(),
                }),
                _ => None,
            }
        };

        let generated = match (prompt, &self.generator) {
            (Some(prompt), Some(generator)) => match generator.generate(prompt).await {
                Ok(g) if !g.text.trim().is_empty() => {
                    Some(Whisper::new(g.text.trim(), g.mood, WhisperSource::Ai))
                }
                Ok(_) => {
                    tracing::warn!("Text generator returned an empty whisper");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Whisper generation failed, using curated pool");
                    None
                }
            },
            _ => None,
        };

        let mut state = self.lock();
        let whisper = match generated {
            Some(whisper) => whisper,
            None => {
                let context = state.context.clone();
                state.selector.select(&context)
            }
        };
        self.remember(&mut state, whisper.text());
        tracing::debug!(
            source = ?whisper.source(),
            mood = ?whisper.mood(),
            mode = %state.context.mode,
            "Whisper ready"
        );
        whisper
    }

    /// 连续选择 `count` 个内置片段
    pub fn select_multiple(&self, count: usize) -> Vec<Whisper> {
        let mut state = self.lock();
        let context = state.context.clone();
        let whispers = state.selector.select_multiple(&context, count);
        for whisper in &whispers {
            self.remember(&mut state, whisper.text());
        }
        whispers
    }

    /// 把外部文本（如留言）作为回声片段
    pub fn echo(&self, text: &str) -> Result<Whisper, ApplicationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApplicationError::validation("echo text must not be empty"));
        }
        if text.chars().count() > MAX_ECHO_CHARS {
            return Err(ApplicationError::validation(format!(
                "echo text exceeds {} characters",
                MAX_ECHO_CHARS
            )));
        }
        let whisper = Whisper::new(text, Mood::Contemplative, WhisperSource::Echo);
        self.remember(&mut self.lock(), whisper.text());
        Ok(whisper)
    }

    fn remember(&self, state: &mut ServiceState, text: &str) {
        state.on_screen.push_back(text.to_string());
        while state.on_screen.len() > self.config.max_on_screen {
            state.on_screen.pop_front();
        }
    }

    // ========== 情境 ==========

    pub fn context(&self) -> WhisperContext {
        self.lock().context.clone()
    }

    pub fn set_mode(&self, mode: PresentationMode) {
        self.lock().context.mode = mode;
    }

    /// `None` 或空白文本清除意图
    pub fn set_intent(&self, intent: Option<&str>) {
        let intent = intent
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(String::from);
        self.lock().context.user_intent = intent;
    }

    pub fn set_time_of_day(&self, time_of_day: TimeOfDay) {
        self.lock().context.time_of_day = time_of_day;
    }

    /// 按本地时间刷新时段，返回新的时段
    pub fn refresh_time_of_day(&self) -> TimeOfDay {
        let now = TimeOfDay::now();
        let mut state = self.lock();
        if state.context.time_of_day != now {
            tracing::info!(from = %state.context.time_of_day, to = %now, "Time of day changed");
            state.context.time_of_day = now;
        }
        now
    }

    /// 清空近期记忆与屏幕片段
    pub fn reset(&self) {
        let mut state = self.lock();
        state.selector.reset();
        state.on_screen.clear();
    }

    pub fn on_screen(&self) -> Vec<String> {
        self.lock().on_screen.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{GeneratedWhisper, TextGenError};
    use crate::domain::audio::VoiceKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        calls: AtomicUsize,
        prompts: Mutex<Vec<WhisperPrompt>>,
        reply: Option<&'static str>,
    }

    impl ScriptedGenerator {
        fn new(reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl TextGeneratorPort for ScriptedGenerator {
        async fn generate(&self, prompt: WhisperPrompt) -> Result<GeneratedWhisper, TextGenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt);
            match self.reply {
                Some(text) => Ok(GeneratedWhisper {
                    text: text.to_string(),
                    mood: Mood::Mysterious,
                }),
                None => Err(TextGenError::Timeout),
            }
        }
    }

    fn config(ai_probability: f64) -> WhisperServiceConfig {
        WhisperServiceConfig {
            ai_probability,
            max_on_screen: 3,
            seed: Some(7),
        }
    }

    #[tokio::test]
    async fn test_ai_whisper_when_probability_is_one() {
        let generator = ScriptedGenerator::new(Some("  the lamp remembers  "));
        let service = WhisperService::new(config(1.0), VoiceKind::Author, Some(generator.clone()));

        let whisper = service.next_whisper().await;
        assert_eq!(whisper.source(), WhisperSource::Ai);
        assert_eq!(whisper.text(), "the lamp remembers");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back_to_curated() {
        let generator = ScriptedGenerator::new(None);
        let service = WhisperService::new(config(1.0), VoiceKind::Lab, Some(generator.clone()));

        let whisper = service.next_whisper().await;
        assert_eq!(whisper.source(), WhisperSource::Curated);
        assert!(!whisper.text().is_empty());
    }

    #[tokio::test]
    async fn test_zero_probability_never_calls_generator() {
        let generator = ScriptedGenerator::new(Some("never"));
        let service =
            WhisperService::new(config(0.0), VoiceKind::Architect, Some(generator.clone()));
        for _ in 0..10 {
            assert_eq!(service.next_whisper().await.source(), WhisperSource::Curated);
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_screen() {
        let generator = ScriptedGenerator::new(Some("hello"));
        let service = WhisperService::new(config(1.0), VoiceKind::Author, Some(generator.clone()));
        service.set_intent(Some("I want to hire someone"));
        service.set_time_of_day(TimeOfDay::Dusk);
        service.echo("first guest").unwrap();

        service.next_whisper().await;
        let prompts = generator.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert_eq!(prompt.mode, VoiceKind::Author);
        assert_eq!(prompt.time_of_day, TimeOfDay::Dusk);
        assert_eq!(prompt.user_intent.as_deref(), Some("I want to hire someone"));
        assert_eq!(prompt.existing, vec!["first guest".to_string()]);
    }

    #[test]
    fn test_on_screen_is_bounded() {
        let service = WhisperService::new(config(0.0), VoiceKind::Lab, None);
        service.select_multiple(5);
        assert_eq!(service.on_screen().len(), 3);
        service.reset();
        assert!(service.on_screen().is_empty());
    }

    #[test]
    fn test_echo_validation() {
        let service = WhisperService::new(config(0.0), VoiceKind::Lab, None);
        let echo = service.echo("  a visitor was here ").unwrap();
        assert_eq!(echo.source(), WhisperSource::Echo);
        assert_eq!(echo.text(), "a visitor was here");
        assert!(service.echo("   ").is_err());
        assert!(service.echo(&"x".repeat(MAX_ECHO_CHARS + 1)).is_err());
    }

    #[test]
    fn test_context_updates() {
        let service = WhisperService::new(config(0.0), VoiceKind::Lab, None);
        service.set_mode(VoiceKind::Architect);
        service.set_intent(Some("  "));
        let ctx = service.context();
        assert_eq!(ctx.mode, VoiceKind::Architect);
        assert_eq!(ctx.user_intent, None);
    }
}

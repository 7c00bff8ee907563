//! Soundscape - 交互手势到音频引擎的桥接
//!
//! 引擎在第一次激活手势（focus / submit）时才创建并初始化；
//! hover 永远不会解锁音频

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

use crate::application::engine::{AmbientDucker, AudioEngine, EngineStatus, TriggeredNote};
use crate::application::error::{ApplicationError, EngineError};
use crate::application::ports::SettingsStorePort;
use crate::application::preferences::{load_audio_settings, save_audio_settings};
use crate::domain::audio::{
    AmbientPreset, AudioSettings, AudioSettingsPatch, PresentationMode, SettingsChange,
};
use crate::domain::harmony::KeyConfig;

type EngineFactory = Box<dyn Fn(AudioSettings) -> AudioEngine + Send + Sync>;

/// 延迟创建的引擎句柄
pub struct LazyEngine {
    factory: EngineFactory,
    cell: OnceCell<Arc<AudioEngine>>,
}

impl LazyEngine {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(AudioSettings) -> AudioEngine + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            cell: OnceCell::new(),
        }
    }

    /// 已创建的引擎
    pub fn get(&self) -> Option<Arc<AudioEngine>> {
        self.cell.get().cloned()
    }

    /// 取得引擎，首次调用时用 `settings` 创建
    pub async fn get_or_create(&self, settings: AudioSettings) -> Arc<AudioEngine> {
        self.cell
            .get_or_init(|| async {
                tracing::debug!("Materializing audio engine");
                Arc::new((self.factory)(settings))
            })
            .await
            .clone()
    }
}

impl AmbientDucker for LazyEngine {
    fn duck_ambient(&self, amount_db: f32, ramp_secs: f64) {
        if let Some(engine) = self.cell.get() {
            engine.duck_ambient(amount_db, ramp_secs);
        }
    }

    fn restore_ambient(&self, ramp_secs: f64) {
        if let Some(engine) = self.cell.get() {
            engine.restore_ambient(ramp_secs);
        }
    }
}

/// 交互手势
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Focus,
    Submit,
    Hover,
}

impl FromStr for Interaction {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focus" => Ok(Self::Focus),
            "submit" => Ok(Self::Submit),
            "hover" => Ok(Self::Hover),
            other => Err(ApplicationError::validation(format!(
                "unknown interaction: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SoundscapeStatus {
    pub mode: PresentationMode,
    pub muted: bool,
    pub settings: AudioSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineStatus>,
}

struct HookState {
    mode: PresentationMode,
    settings: AudioSettings,
    muted: bool,
}

pub struct Soundscape {
    engine: Arc<LazyEngine>,
    store: Arc<dyn SettingsStorePort>,
    state: Mutex<HookState>,
}

impl Soundscape {
    /// 从设置存储恢复调性、音色和力度；静音状态不持久化，初始为静音
    pub fn new(
        engine: Arc<LazyEngine>,
        store: Arc<dyn SettingsStorePort>,
        mode: PresentationMode,
    ) -> Self {
        let settings = load_audio_settings(store.as_ref());
        Self {
            engine,
            store,
            state: Mutex::new(HookState {
                mode,
                settings,
                muted: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HookState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 声床 ducking 入口（引擎尚未创建时为 no-op）
    pub fn ducker(&self) -> Arc<dyn AmbientDucker> {
        self.engine.clone()
    }

    pub fn engine(&self) -> Option<Arc<AudioEngine>> {
        self.engine.get()
    }

    /// 创建并初始化引擎，同步当前模式和静音状态
    pub async fn activate(&self) -> Result<Arc<AudioEngine>, EngineError> {
        let settings = self.lock().settings;
        let engine = self.engine.get_or_create(settings).await;
        let was_ready = engine.is_ready();
        engine.init().await?;

        let (mode, muted) = {
            let state = self.lock();
            (state.mode, state.muted)
        };
        engine.apply_preset(AmbientPreset::for_mode(mode));
        engine.set_muted(muted);
        if !was_ready {
            tracing::info!(%mode, muted, "Soundscape activated");
        }
        Ok(engine)
    }

    /// 处理一次交互手势，返回触发的 UI 音符
    pub async fn interact(
        &self,
        interaction: Interaction,
    ) -> Result<Option<TriggeredNote>, EngineError> {
        let mode = self.lock().mode;
        match interaction {
            Interaction::Focus => {
                self.activate().await?;
                Ok(None)
            }
            Interaction::Submit => {
                let engine = self.activate().await?;
                Ok(engine.play_ui_sound(mode))
            }
            Interaction::Hover => Ok(self
                .engine
                .get()
                .filter(|engine| engine.is_ready())
                .and_then(|engine| engine.play_ui_sound(mode))),
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.lock().mode
    }

    /// 切换模式并应用对应的声床预设
    pub fn set_mode(&self, mode: PresentationMode) {
        {
            let mut state = self.lock();
            if state.mode == mode {
                return;
            }
            state.mode = mode;
        }
        if let Some(engine) = self.engine.get() {
            engine.apply_preset(AmbientPreset::for_mode(mode));
        }
        tracing::info!(%mode, "Presentation mode changed");
    }

    pub fn settings(&self) -> AudioSettings {
        self.lock().settings
    }

    /// 应用并持久化设置
    pub fn update_settings(
        &self,
        patch: &AudioSettingsPatch,
    ) -> Result<SettingsChange, ApplicationError> {
        let (change, settings) = {
            let mut state = self.lock();
            let change = state.settings.apply(patch);
            (change, state.settings)
        };
        if let Some(engine) = self.engine.get() {
            engine.update_settings(patch);
        }
        if change != SettingsChange::default() {
            save_audio_settings(self.store.as_ref(), &settings)?;
        }
        Ok(change)
    }

    pub fn key_config(&self) -> KeyConfig {
        self.lock().settings.key_config()
    }

    pub fn set_key_config(&self, config: KeyConfig) -> Result<SettingsChange, ApplicationError> {
        self.update_settings(&AudioSettingsPatch {
            key: Some(config.key),
            mode: Some(config.mode),
            ..Default::default()
        })
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    pub fn set_muted(&self, muted: bool) {
        self.lock().muted = muted;
        if let Some(engine) = self.engine.get() {
            engine.set_muted(muted);
        }
    }

    pub fn toggle_mute(&self) -> bool {
        let muted = !self.is_muted();
        self.set_muted(muted);
        muted
    }

    pub fn start_ambient(&self) {
        if let Some(engine) = self.engine.get() {
            engine.start_ambient();
        }
    }

    pub fn stop_ambient(&self) {
        if let Some(engine) = self.engine.get() {
            engine.stop_ambient();
        }
    }

    /// 离开体验时释放引擎
    pub fn shutdown(&self) {
        if let Some(engine) = self.engine.get() {
            engine.dispose();
        }
    }

    pub fn status(&self) -> SoundscapeStatus {
        let (mode, muted, settings) = {
            let state = self.lock();
            (state.mode, state.muted, state.settings)
        };
        SoundscapeStatus {
            mode,
            muted,
            settings,
            engine: self.engine.get().map(|engine| engine.status()),
        }
    }
}

//! Audio Engine - 合成图生命周期
//!
//! 状态机 Uninitialized → Initializing → Ready，另有独立的静音、
//! 声床播放两个标志。除 `init` 外的操作在未就绪时都是 no-op
//!
//! 信号图:
//! ```text
//! noise → lowpass(LFO 扫频) → ambient level ─┐
//! root  → vibrato ─┐                          ├→ bed (ducking) ─┐
//! fifth → vibrato ─┴→ drone level ────────────┘                  ├→ master → out
//! synth × 3 → [lowpass] → reverb → ui bus (velocity) ────────────┘
//! ```

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::error::EngineError;
use crate::application::ports::{AudioBackendPort, BackendError, NodeId, ParamId};
use crate::domain::audio::{
    humanize_detune, AmbientPreset, AudioSettings, AudioSettingsPatch, SettingsChange, VoiceKind,
    VoiceProfile,
};
use crate::domain::harmony::{drone_frequencies, harmonic_note_set, HarmonicNoteSet};

use super::graph_builder::{build_path, BuiltPath};
use super::signal_path::{
    ambient_path, bus, drone_path, voice_path, STAGE_BREATH, STAGE_FILTER, STAGE_LEVEL,
    STAGE_SOURCE,
};
use super::AmbientDucker;

/// 视为静音的电平
pub const SILENCE_DB: f32 = -80.0;
pub const FADE_IN_SECS: f64 = 2.0;
pub const FADE_OUT_SECS: f64 = 1.0;
/// 触发时间相对当前时钟的提前量
pub const LOOKAHEAD_SECS: f64 = 0.01;
/// 同一声部两次触发的最小间隔
pub const MIN_TRIGGER_SPACING_SECS: f64 = 0.02;
/// 换调时持续音的滑音时长
pub const RETUNE_SECS: f64 = 0.1;
/// 切换模式预设的过渡时长
pub const PRESET_RAMP_SECS: f64 = 1.0;
/// 声床总线的标称电平
const BED_NOMINAL_DB: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
}

/// 一次 UI 音效触发
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriggeredNote {
    pub voice: VoiceKind,
    /// 在声部音符数组中的位置
    pub index: usize,
    pub frequency: f64,
    pub detune_cents: f32,
    /// 触发时间（后端时钟，秒）
    pub at: f64,
    pub gate: f64,
}

/// 引擎状态快照
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub muted: bool,
    pub ambient_playing: bool,
    pub ducked: bool,
    pub settings: AudioSettings,
    pub preset: AmbientPreset,
    pub node_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_gain_db: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_gain_db: Option<f32>,
}

/// 关键节点 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphHandles {
    pub master: NodeId,
    pub bed: NodeId,
    pub ui_bus: NodeId,
    pub ambient_level: NodeId,
    pub drone_level: NodeId,
    pub breath: NodeId,
    pub ambient_filter: NodeId,
    pub drone_root: NodeId,
    pub drone_fifth: NodeId,
    /// 按 `VoiceKind::index` 排列
    pub synths: [NodeId; 3],
}

struct VoiceChannel {
    synth: NodeId,
    last_trigger: Option<f64>,
}

struct Graph {
    /// 按构建顺序
    paths: Vec<BuiltPath>,
    handles: GraphHandles,
    /// 声床的所有声源（含 LFO）
    ambient_sources: Vec<NodeId>,
    voices: Vec<VoiceChannel>,
}

struct EngineInner {
    state: EngineState,
    muted: bool,
    ambient_playing: bool,
    settings: AudioSettings,
    notes: HarmonicNoteSet,
    preset: AmbientPreset,
    graph: Option<Graph>,
    /// 第一次 duck 之前的声床电平
    pre_duck_db: Option<f32>,
    /// 声床在未 duck 时所处的电平
    bed_level_db: f32,
    /// 每个声部的触发计数
    interactions: [u64; 3],
}

fn missing(path: &BuiltPath, label: &str) -> BackendError {
    BackendError::InvalidConnection(format!("{}: missing stage '{}'", path.name(), label))
}

fn stage(path: &BuiltPath, label: &str) -> Result<NodeId, BackendError> {
    path.node(label).ok_or_else(|| missing(path, label))
}

fn log_backend(op: &'static str, result: Result<(), BackendError>) {
    if let Err(e) = result {
        tracing::warn!(op, error = %e, "Audio backend call failed");
    }
}

/// 音频引擎
///
/// 显式构造、显式持有；图只在 `init` 中构建一次
pub struct AudioEngine {
    backend: Arc<dyn AudioBackendPort>,
    inner: Mutex<EngineInner>,
    init_lock: tokio::sync::Mutex<()>,
}

impl AudioEngine {
    pub fn new(backend: Arc<dyn AudioBackendPort>, settings: AudioSettings) -> Self {
        Self {
            backend,
            inner: Mutex::new(EngineInner {
                state: EngineState::Uninitialized,
                muted: true,
                ambient_playing: false,
                notes: harmonic_note_set(&settings.key_config()),
                settings,
                preset: AmbientPreset::default(),
                graph: None,
                pre_duck_db: None,
                bed_level_db: BED_NOMINAL_DB,
                interactions: [0; 3],
            }),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========== 生命周期 ==========

    /// 启动音频上下文并构建信号图
    ///
    /// 幂等；失败时释放已创建的节点，引擎回到 Uninitialized，可重试
    pub async fn init(&self) -> Result<(), EngineError> {
        let _guard = self.init_lock.lock().await;

        let (settings, preset) = {
            let mut inner = self.lock();
            if inner.state == EngineState::Ready {
                return Ok(());
            }
            inner.state = EngineState::Initializing;
            (inner.settings, inner.preset)
        };

        if let Err(e) = self.backend.resume().await {
            self.lock().state = EngineState::Uninitialized;
            tracing::warn!(error = %e, "Audio context failed to start");
            return Err(EngineError::Unavailable(e.to_string()));
        }

        let graph = match self.build_graph(&settings, &preset).await {
            Ok(graph) => graph,
            Err(e) => {
                self.lock().state = EngineState::Uninitialized;
                tracing::error!(error = %e, "Failed to build audio graph");
                return Err(e.into());
            }
        };

        let mut guard = self.lock();
        let inner = &mut *guard;
        // 构建期间可能有设置 / 预设更新
        if inner.settings != settings {
            self.sync_settings(&graph.handles, &inner.settings, SettingsChange {
                key_changed: true,
                tone_changed: true,
                velocity_changed: true,
            });
        }
        if inner.preset != preset {
            self.sync_preset(&graph.handles, &inner.preset, false);
        }
        log_backend("mute", self.backend.set_muted(graph.handles.master, inner.muted));

        tracing::info!(
            nodes = self.backend.node_count(),
            key = %inner.settings.key_config(),
            muted = inner.muted,
            "Audio engine ready"
        );
        inner.graph = Some(graph);
        inner.state = EngineState::Ready;
        Ok(())
    }

    async fn build_graph(
        &self,
        settings: &AudioSettings,
        preset: &AmbientPreset,
    ) -> Result<Graph, BackendError> {
        let mut built = Vec::new();
        match self.build_paths(settings, preset, &mut built).await {
            Ok(graph) => Ok(graph),
            Err(e) => {
                for path in built.iter().rev() {
                    path.dispose(self.backend.as_ref());
                }
                Err(e)
            }
        }
    }

    async fn build_paths(
        &self,
        settings: &AudioSettings,
        preset: &AmbientPreset,
        built: &mut Vec<BuiltPath>,
    ) -> Result<Graph, BackendError> {
        let backend = self.backend.as_ref();

        let master = build_path(backend, &bus("master", 0.0), None).await?;
        built.push(master.clone());
        let bed = build_path(backend, &bus("bed", BED_NOMINAL_DB), Some(master.output())).await?;
        built.push(bed.clone());
        let ui_bus = build_path(
            backend,
            &bus("ui", settings.velocity.to_db()),
            Some(master.output()),
        )
        .await?;
        built.push(ui_bus.clone());

        // (a) 环境声床
        let ambient =
            build_path(backend, &ambient_path(preset, SILENCE_DB), Some(bed.output())).await?;
        built.push(ambient.clone());

        // (b) 根音 + 五度持续音
        let drone_bus = build_path(backend, &bus("drone", SILENCE_DB), Some(bed.output())).await?;
        built.push(drone_bus.clone());
        let (root, fifth) = drone_frequencies(&settings.key_config());
        let drone_root =
            build_path(backend, &drone_path("drone:root", root), Some(drone_bus.output())).await?;
        built.push(drone_root.clone());
        let drone_fifth =
            build_path(backend, &drone_path("drone:fifth", fifth), Some(drone_bus.output()))
                .await?;
        built.push(drone_fifth.clone());

        // (c) 三个 UI 声部
        let mut voices = Vec::with_capacity(VoiceKind::ALL.len());
        let mut synths = [NodeId(0); 3];
        for voice in VoiceKind::ALL {
            let path =
                build_path(backend, &voice_path(voice, settings.tone), Some(ui_bus.output()))
                    .await?;
            built.push(path.clone());
            let synth = stage(&path, STAGE_SOURCE)?;
            synths[voice.index()] = synth;
            voices.push(VoiceChannel {
                synth,
                last_trigger: None,
            });
        }

        let handles = GraphHandles {
            master: master.output(),
            bed: bed.output(),
            ui_bus: ui_bus.output(),
            ambient_level: stage(&ambient, STAGE_LEVEL)?,
            drone_level: drone_bus.output(),
            breath: stage(&ambient, STAGE_BREATH)?,
            ambient_filter: stage(&ambient, STAGE_FILTER)?,
            drone_root: stage(&drone_root, STAGE_SOURCE)?,
            drone_fifth: stage(&drone_fifth, STAGE_SOURCE)?,
            synths,
        };

        let ambient_sources = [&ambient, &drone_root, &drone_fifth]
            .iter()
            .flat_map(|p| p.startable().iter().copied())
            .collect();

        Ok(Graph {
            paths: built.clone(),
            handles,
            ambient_sources,
            voices,
        })
    }

    /// 停止所有声源并释放所有节点，回到 Uninitialized
    ///
    /// 初始化进行中时不做任何事
    pub fn dispose(&self) {
        let graph = {
            let mut inner = self.lock();
            if inner.state == EngineState::Initializing {
                tracing::debug!("Dispose ignored while initializing");
                return;
            }
            inner.state = EngineState::Uninitialized;
            inner.ambient_playing = false;
            inner.pre_duck_db = None;
            inner.bed_level_db = BED_NOMINAL_DB;
            inner.graph.take()
        };

        if let Some(graph) = graph {
            let now = self.backend.now();
            for &source in &graph.ambient_sources {
                log_backend("stop", self.backend.stop(source, now));
            }
            for path in graph.paths.iter().rev() {
                path.dispose(self.backend.as_ref());
            }
            tracing::info!(remaining = self.backend.node_count(), "Audio engine disposed");
        }
    }

    // ========== 声床 ==========

    fn fade_in(&self, inner: &mut EngineInner) {
        let Some(graph) = inner.graph.as_ref() else {
            return;
        };
        let now = self.backend.now();
        let h = &graph.handles;
        log_backend(
            "fade_in",
            self.backend.ramp_param(
                h.ambient_level,
                ParamId::GainDb,
                inner.preset.ambient_level_db,
                now,
                FADE_IN_SECS,
            ),
        );
        log_backend(
            "fade_in",
            self.backend.ramp_param(
                h.drone_level,
                ParamId::GainDb,
                inner.preset.drone_level_db,
                now,
                FADE_IN_SECS,
            ),
        );
        for &source in &graph.ambient_sources {
            log_backend("start", self.backend.start(source, now));
        }
        inner.ambient_playing = true;
        tracing::debug!(at = now, "Ambient bed fading in");
    }

    fn fade_out(&self, inner: &mut EngineInner) {
        let Some(graph) = inner.graph.as_ref() else {
            return;
        };
        let now = self.backend.now();
        let h = &graph.handles;
        for level in [h.ambient_level, h.drone_level] {
            log_backend(
                "fade_out",
                self.backend
                    .ramp_param(level, ParamId::GainDb, SILENCE_DB, now, FADE_OUT_SECS),
            );
        }
        for &source in &graph.ambient_sources {
            log_backend("stop", self.backend.stop(source, now + FADE_OUT_SECS));
        }
        inner.ambient_playing = false;
        tracing::debug!(at = now, "Ambient bed fading out");
    }

    /// 淡入声床（≈2s）；静音、未就绪或已在播放时不做任何事
    pub fn start_ambient(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != EngineState::Ready || inner.muted || inner.ambient_playing {
            return;
        }
        self.fade_in(inner);
    }

    /// 淡出声床（≈1s）后停止声源；静音、未就绪或未在播放时不做任何事
    pub fn stop_ambient(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != EngineState::Ready || inner.muted || !inner.ambient_playing {
            return;
        }
        self.fade_out(inner);
    }

    // ========== UI 音效 ==========

    /// 按轮转顺序为声部触发下一个音符
    pub fn play_ui_sound(&self, voice: VoiceKind) -> Option<TriggeredNote> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != EngineState::Ready || inner.muted {
            return None;
        }

        let notes = inner.notes.for_voice(voice);
        if notes.is_empty() {
            return None;
        }
        let count = inner.interactions[voice.index()];
        let index = (count % notes.len() as u64) as usize;
        let frequency = notes[index];
        let detune_cents = humanize_detune(voice, count);
        let gate = VoiceProfile::for_voice(voice).note_length as f64;

        let channel = inner.graph.as_mut()?.voices.get_mut(voice.index())?;
        let mut at = self.backend.now() + LOOKAHEAD_SECS;
        if let Some(last) = channel.last_trigger {
            at = at.max(last + MIN_TRIGGER_SPACING_SECS);
        }

        match self
            .backend
            .trigger(channel.synth, frequency as f32, detune_cents, gate, at)
        {
            Ok(()) => {
                channel.last_trigger = Some(at);
                inner.interactions[voice.index()] += 1;
                tracing::trace!(%voice, frequency, detune_cents, at, "UI sound");
                Some(TriggeredNote {
                    voice,
                    index,
                    frequency,
                    detune_cents,
                    at,
                    gate,
                })
            }
            Err(e) => {
                tracing::warn!(%voice, error = %e, "UI sound trigger rejected");
                None
            }
        }
    }

    // ========== 静音 ==========

    /// 静音：淡出声床并静音主输出；取消静音：恢复主输出并重新淡入声床
    ///
    /// 未就绪时只记录标志
    pub fn set_muted(&self, muted: bool) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.muted == muted {
            return;
        }

        if inner.state == EngineState::Ready {
            let master = inner.graph.as_ref().map(|g| g.handles.master);
            if muted {
                if inner.ambient_playing {
                    self.fade_out(inner);
                }
                if let Some(master) = master {
                    log_backend("mute", self.backend.set_muted(master, true));
                }
                inner.muted = true;
            } else {
                if let Some(master) = master {
                    log_backend("mute", self.backend.set_muted(master, false));
                }
                inner.muted = false;
                self.fade_in(inner);
            }
        } else {
            inner.muted = muted;
        }
        tracing::info!(muted, "Mute changed");
    }

    /// 切换静音，返回新的静音状态
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.is_muted();
        self.set_muted(muted);
        muted
    }

    // ========== Ducking ==========

    /// 平滑压低声床；多次调用都以第一次之前的电平为基准
    pub fn duck_ambient(&self, amount_db: f32, ramp_secs: f64) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != EngineState::Ready {
            return;
        }
        let Some(graph) = inner.graph.as_ref() else {
            return;
        };
        let base = *inner.pre_duck_db.get_or_insert(inner.bed_level_db);
        let now = self.backend.now();
        log_backend(
            "duck",
            self.backend.ramp_param(
                graph.handles.bed,
                ParamId::GainDb,
                base + amount_db,
                now,
                ramp_secs,
            ),
        );
        tracing::debug!(amount_db, ramp_secs, "Ambient ducked");
    }

    /// 平滑恢复到 duck 之前的电平
    pub fn restore_ambient(&self, ramp_secs: f64) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != EngineState::Ready {
            return;
        }
        let Some(graph) = inner.graph.as_ref() else {
            return;
        };
        let Some(level) = inner.pre_duck_db.take() else {
            return;
        };
        let now = self.backend.now();
        log_backend(
            "restore",
            self.backend
                .ramp_param(graph.handles.bed, ParamId::GainDb, level, now, ramp_secs),
        );
        inner.bed_level_db = level;
        tracing::debug!(level, ramp_secs, "Ambient restored");
    }

    // ========== 设置 ==========

    /// 应用部分设置；未就绪时只记录，就绪时同步到信号图
    pub fn update_settings(&self, patch: &AudioSettingsPatch) -> SettingsChange {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let change = inner.settings.apply(patch);
        if change.key_changed {
            inner.notes = harmonic_note_set(&inner.settings.key_config());
        }
        if inner.state == EngineState::Ready {
            if let Some(graph) = inner.graph.as_ref() {
                self.sync_settings(&graph.handles, &inner.settings, change);
            }
        }
        if change != SettingsChange::default() {
            tracing::info!(
                key = %inner.settings.key_config(),
                tone = ?inner.settings.tone,
                velocity = inner.settings.velocity.value(),
                "Audio settings updated"
            );
        }
        change
    }

    fn sync_settings(&self, h: &GraphHandles, settings: &AudioSettings, change: SettingsChange) {
        let now = self.backend.now();
        if change.key_changed {
            let (root, fifth) = drone_frequencies(&settings.key_config());
            for (osc, freq) in [(h.drone_root, root), (h.drone_fifth, fifth)] {
                log_backend(
                    "retune",
                    self.backend
                        .ramp_param(osc, ParamId::Frequency, freq as f32, now, RETUNE_SECS),
                );
            }
        }
        if change.tone_changed {
            for synth in h.synths {
                log_backend("tone", self.backend.set_tone(synth, settings.tone));
            }
        }
        if change.velocity_changed {
            log_backend(
                "velocity",
                self.backend
                    .set_param(h.ui_bus, ParamId::GainDb, settings.velocity.to_db(), now),
            );
        }
    }

    /// 切换模式预设（滤波扫频范围、呼吸周期、声床电平）
    pub fn apply_preset(&self, preset: AmbientPreset) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.preset == preset {
            return;
        }
        inner.preset = preset;
        if inner.state == EngineState::Ready {
            if let Some(graph) = inner.graph.as_ref() {
                self.sync_preset(&graph.handles, &preset, inner.ambient_playing);
            }
        }
    }

    fn sync_preset(&self, h: &GraphHandles, preset: &AmbientPreset, playing: bool) {
        let now = self.backend.now();
        let params = [
            (h.breath, ParamId::Min, preset.filter_min_hz),
            (h.breath, ParamId::Max, preset.filter_max_hz),
            (h.breath, ParamId::Frequency, 1.0 / preset.breath_period_secs),
            (h.ambient_filter, ParamId::Q, preset.filter_q),
        ];
        for (node, param, value) in params {
            log_backend(
                "preset",
                self.backend
                    .ramp_param(node, param, value, now, PRESET_RAMP_SECS),
            );
        }
        if playing {
            for (level, db) in [
                (h.ambient_level, preset.ambient_level_db),
                (h.drone_level, preset.drone_level_db),
            ] {
                log_backend(
                    "preset",
                    self.backend
                        .ramp_param(level, ParamId::GainDb, db, now, PRESET_RAMP_SECS),
                );
            }
        }
    }

    // ========== 查询 ==========

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    pub fn is_ambient_playing(&self) -> bool {
        self.lock().ambient_playing
    }

    pub fn settings(&self) -> AudioSettings {
        self.lock().settings
    }

    pub fn notes(&self) -> HarmonicNoteSet {
        self.lock().notes.clone()
    }

    pub fn preset(&self) -> AmbientPreset {
        self.lock().preset
    }

    pub fn handles(&self) -> Option<GraphHandles> {
        self.lock().graph.as_ref().map(|g| g.handles)
    }

    pub fn status(&self) -> EngineStatus {
        let inner = self.lock();
        let handles = inner.graph.as_ref().map(|g| g.handles);
        EngineStatus {
            state: inner.state,
            muted: inner.muted,
            ambient_playing: inner.ambient_playing,
            ducked: inner.pre_duck_db.is_some(),
            settings: inner.settings,
            preset: inner.preset,
            node_count: self.backend.node_count(),
            bed_gain_db: handles.and_then(|h| self.backend.param_value(h.bed, ParamId::GainDb)),
            ui_gain_db: handles.and_then(|h| self.backend.param_value(h.ui_bus, ParamId::GainDb)),
        }
    }
}

impl AmbientDucker for AudioEngine {
    fn duck_ambient(&self, amount_db: f32, ramp_secs: f64) {
        AudioEngine::duck_ambient(self, amount_db, ramp_secs);
    }

    fn restore_ambient(&self, ramp_secs: f64) {
        AudioEngine::restore_ambient(self, ramp_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::{Tone, Velocity};
    use crate::domain::harmony::{PitchClass, ScaleMode};
    use crate::infrastructure::synth::SoftwareBackend;

    const SR: u32 = 8_000;

    async fn ready_engine() -> (Arc<SoftwareBackend>, AudioEngine) {
        let backend = SoftwareBackend::new(SR).arc();
        let engine = AudioEngine::new(backend.clone(), AudioSettings::default());
        engine.init().await.unwrap();
        (backend, engine)
    }

    fn gain(backend: &SoftwareBackend, node: NodeId) -> f32 {
        backend.param_value(node, ParamId::GainDb).unwrap()
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (backend, engine) = ready_engine().await;
        let nodes = backend.node_count();
        assert!(nodes > 0);
        engine.init().await.unwrap();
        assert_eq!(backend.node_count(), nodes);
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_init_failure_leaves_engine_retryable() {
        let backend = SoftwareBackend::new(0).arc();
        let engine = AudioEngine::new(backend.clone(), AudioSettings::default());

        let err = engine.init().await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(backend.node_count(), 0);

        engine.set_muted(false);
        engine.start_ambient();
        assert!(engine.play_ui_sound(VoiceKind::Lab).is_none());
        assert!(!engine.is_ambient_playing());
    }

    #[tokio::test]
    async fn test_muted_by_default() {
        let (backend, engine) = ready_engine().await;
        assert!(engine.is_muted());
        assert!(backend.is_muted(engine.handles().unwrap().master));
        assert!(engine.play_ui_sound(VoiceKind::Architect).is_none());
        engine.start_ambient();
        assert!(!engine.is_ambient_playing());
    }

    #[tokio::test]
    async fn test_ui_sound_round_robin_wraps() {
        let (_backend, engine) = ready_engine().await;
        engine.set_muted(false);

        let notes = engine.notes();
        let expected = notes.for_voice(VoiceKind::Author).to_vec();
        let played: Vec<TriggeredNote> = (0..expected.len() + 1)
            .map(|_| engine.play_ui_sound(VoiceKind::Author).unwrap())
            .collect();

        for (i, note) in played.iter().enumerate() {
            assert_eq!(note.index, i % expected.len());
            assert_eq!(note.frequency, expected[i % expected.len()]);
        }
        assert_eq!(played[expected.len()].frequency, played[0].frequency);
    }

    #[tokio::test]
    async fn test_rapid_triggers_strictly_increasing() {
        let (_backend, engine) = ready_engine().await;
        engine.set_muted(false);

        let times: Vec<f64> = (0..20)
            .map(|_| engine.play_ui_sound(VoiceKind::Lab).unwrap().at)
            .collect();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= MIN_TRIGGER_SPACING_SECS - 1e-12);
        }
    }

    #[tokio::test]
    async fn test_detune_is_reproducible() {
        let (_b1, first) = ready_engine().await;
        let (_b2, second) = ready_engine().await;
        first.set_muted(false);
        second.set_muted(false);
        for _ in 0..5 {
            let a = first.play_ui_sound(VoiceKind::Lab).unwrap();
            let b = second.play_ui_sound(VoiceKind::Lab).unwrap();
            assert_eq!(a.detune_cents, b.detune_cents);
            assert!(a.detune_cents.abs() <= 24.0);
        }
    }

    #[tokio::test]
    async fn test_mute_stops_ambient_within_fade_window() {
        let (backend, engine) = ready_engine().await;
        let h = engine.handles().unwrap();
        let preset = engine.preset();

        engine.set_muted(false);
        assert!(engine.is_ambient_playing());
        backend.advance(FADE_IN_SECS + 0.1);
        assert_eq!(gain(&backend, h.ambient_level), preset.ambient_level_db);
        assert_eq!(gain(&backend, h.drone_level), preset.drone_level_db);
        assert!(backend.is_active(h.drone_root));

        engine.set_muted(true);
        assert!(backend.is_muted(h.master));
        assert!(!engine.is_ambient_playing());
        backend.advance(FADE_OUT_SECS + 0.05);
        assert!(!backend.is_active(h.drone_root));
        assert!(!backend.is_active(h.drone_fifth));
        assert!(!backend.is_active(h.breath));
        assert_eq!(gain(&backend, h.ambient_level), SILENCE_DB);

        // 取消静音后重新淡入
        engine.set_muted(false);
        assert!(!backend.is_muted(h.master));
        assert!(engine.is_ambient_playing());
        assert_eq!(gain(&backend, h.ambient_level), SILENCE_DB);
        backend.advance(FADE_IN_SECS + 0.1);
        assert_eq!(gain(&backend, h.ambient_level), preset.ambient_level_db);
    }

    #[tokio::test]
    async fn test_stop_ambient_fades_then_stops() {
        let (backend, engine) = ready_engine().await;
        let h = engine.handles().unwrap();
        engine.set_muted(false);
        backend.advance(0.5);

        engine.stop_ambient();
        assert!(!engine.is_ambient_playing());
        assert!(backend.is_active(h.drone_root));
        backend.advance(FADE_OUT_SECS + 0.05);
        assert!(!backend.is_active(h.drone_root));

        // 再次停止是 no-op
        engine.stop_ambient();
        engine.start_ambient();
        assert!(backend.is_active(h.drone_root));
    }

    #[tokio::test]
    async fn test_duck_restore_is_exact() {
        let (backend, engine) = ready_engine().await;
        let h = engine.handles().unwrap();
        engine.set_muted(false);
        backend.advance(0.2);

        let before = gain(&backend, h.bed);
        engine.duck_ambient(-2.0, 0.3);
        backend.advance(0.1);
        engine.update_settings(&AudioSettingsPatch {
            velocity: Some(Velocity::new(20)),
            ..Default::default()
        });
        engine.duck_ambient(-6.0, 0.3);
        backend.advance(0.4);
        assert_eq!(gain(&backend, h.bed), before - 6.0);
        assert!(engine.status().ducked);

        engine.restore_ambient(0.3);
        backend.advance(0.4);
        assert_eq!(gain(&backend, h.bed), before);
        assert_eq!(gain(&backend, h.ui_bus), Velocity::new(20).to_db());
        assert!(!engine.status().ducked);

        // 没有 duck 时 restore 不做任何事
        engine.restore_ambient(0.3);
        assert_eq!(gain(&backend, h.bed), before);
    }

    #[tokio::test]
    async fn test_key_change_retunes_drones_in_place() {
        let (backend, engine) = ready_engine().await;
        let h = engine.handles().unwrap();
        let nodes = backend.node_count();

        let change = engine.update_settings(&AudioSettingsPatch {
            key: Some(PitchClass::A),
            mode: Some(ScaleMode::Major),
            ..Default::default()
        });
        assert!(change.key_changed);
        backend.advance(RETUNE_SECS + 0.05);

        let (root, fifth) =
            drone_frequencies(&crate::domain::harmony::KeyConfig::new(PitchClass::A, ScaleMode::Major));
        let got_root = backend.param_value(h.drone_root, ParamId::Frequency).unwrap();
        let got_fifth = backend.param_value(h.drone_fifth, ParamId::Frequency).unwrap();
        assert!((got_root - root as f32).abs() < 1e-3);
        assert!((got_fifth - fifth as f32).abs() < 1e-3);
        assert_eq!(backend.node_count(), nodes);
        assert_eq!(
            engine.notes(),
            harmonic_note_set(&crate::domain::harmony::KeyConfig::new(
                PitchClass::A,
                ScaleMode::Major
            ))
        );
    }

    #[tokio::test]
    async fn test_tone_change_swaps_waveforms() {
        let (backend, engine) = ready_engine().await;
        engine.update_settings(&AudioSettingsPatch {
            tone: Some(Tone::Square),
            ..Default::default()
        });
        for synth in engine.handles().unwrap().synths {
            assert_eq!(backend.tone_of(synth), Some(Tone::Square));
        }
    }

    #[tokio::test]
    async fn test_settings_recorded_before_init() {
        let backend = SoftwareBackend::new(SR).arc();
        let engine = AudioEngine::new(backend.clone(), AudioSettings::default());
        engine.update_settings(&AudioSettingsPatch {
            tone: Some(Tone::Triangle),
            velocity: Some(Velocity::new(100)),
            ..Default::default()
        });
        assert_eq!(backend.node_count(), 0);

        engine.init().await.unwrap();
        let h = engine.handles().unwrap();
        assert_eq!(backend.tone_of(h.synths[0]), Some(Tone::Triangle));
        assert_eq!(gain(&backend, h.ui_bus), 0.0);
    }

    #[tokio::test]
    async fn test_apply_preset_moves_filter_sweep() {
        let (backend, engine) = ready_engine().await;
        let h = engine.handles().unwrap();
        let lab = AmbientPreset::for_mode(VoiceKind::Lab);
        engine.apply_preset(lab);
        backend.advance(PRESET_RAMP_SECS + 0.1);
        assert_eq!(
            backend.param_value(h.breath, ParamId::Max).unwrap(),
            lab.filter_max_hz
        );
        assert_eq!(engine.preset(), lab);
    }

    #[tokio::test]
    async fn test_dispose_releases_graph() {
        let (backend, engine) = ready_engine().await;
        engine.set_muted(false);
        engine.dispose();

        assert_eq!(backend.node_count(), 0);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.play_ui_sound(VoiceKind::Author).is_none());

        engine.init().await.unwrap();
        assert!(engine.is_ready());
        assert!(backend.node_count() > 0);
    }
}

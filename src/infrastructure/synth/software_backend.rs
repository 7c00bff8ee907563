//! Software Audio Backend
//!
//! `AudioBackendPort` 的纯软件实现：
//! - 节点保存在按 ID 索引的槽位里，释放后槽位置空
//! - 渲染时按拓扑序逐样本处理，参数按 64 样本的控制块求值
//! - 语音片段在主输出之后混入（不受主音量静音影响）

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::application::ports::{AudioBackendPort, BackendError, NodeId, NodeSpec, ParamId};
use crate::domain::audio::Tone;

use super::nodes::Node;

/// 控制块大小（样本）
pub const CONTROL_BLOCK: usize = 64;

pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// 正在播放的语音片段
struct Clip {
    id: u64,
    samples: Vec<f32>,
    pos: usize,
    done: Option<oneshot::Sender<bool>>,
}

/// 编译后的渲染计划
#[derive(Default)]
struct Plan {
    order: Vec<usize>,
    inputs: Vec<Vec<usize>>,
    to_destination: Vec<usize>,
}

struct GraphState {
    sample_rate: u32,
    frame: u64,
    running: bool,
    nodes: Vec<Option<Node>>,
    edges: Vec<(NodeId, Option<NodeId>)>,
    modulations: Vec<(NodeId, NodeId, ParamId)>,
    plan: Option<Plan>,
    outputs: Vec<f32>,
    clips: VecDeque<Clip>,
}

impl GraphState {
    fn now(&self) -> f64 {
        self.frame as f64 / self.sample_rate.max(1) as f64
    }

    fn node(&self, id: NodeId) -> Result<&Node, BackendError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(|n| n.as_ref())
            .ok_or(BackendError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, BackendError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(BackendError::NodeNotFound(id))
    }

    /// `to` 是否能沿音频连接到达 `from`
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(cur) = stack.pop() {
            if cur == target {
                return true;
            }
            let idx = cur.0 as usize;
            if seen.get(idx).copied().unwrap_or(true) {
                continue;
            }
            seen[idx] = true;
            for (a, b) in &self.edges {
                if *a == cur {
                    if let Some(next) = b {
                        stack.push(*next);
                    }
                }
            }
        }
        false
    }

    fn compile(&self) -> Plan {
        let n = self.nodes.len();
        let mut inputs = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];
        let mut to_destination = Vec::new();
        for (from, to) in &self.edges {
            match to {
                Some(to) => {
                    inputs[to.0 as usize].push(from.0 as usize);
                    indegree[to.0 as usize] += 1;
                }
                None => to_destination.push(from.0 as usize),
            }
        }

        // Kahn；connect 已拒绝环
        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&i| self.nodes[i].is_some() && indegree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for (from, to) in &self.edges {
                if from.0 as usize == i {
                    if let Some(to) = to {
                        let t = to.0 as usize;
                        indegree[t] -= 1;
                        if indegree[t] == 0 {
                            queue.push_back(t);
                        }
                    }
                }
            }
        }

        Plan {
            order,
            inputs,
            to_destination,
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        if self.plan.is_none() {
            self.plan = Some(self.compile());
        }
        let Some(plan) = self.plan.take() else {
            return;
        };
        let sr = self.sample_rate as f32;
        if self.outputs.len() != self.nodes.len() {
            self.outputs = vec![0.0; self.nodes.len()];
        }

        for chunk in out.chunks_mut(CONTROL_BLOCK) {
            let block_start = self.now();
            for &i in &plan.order {
                if let Some(node) = self.nodes[i].as_mut() {
                    node.begin_block(block_start, sr);
                }
            }
            for k in 0..self.modulations.len() {
                let (source, target, param) = self.modulations[k];
                let value = self.nodes[source.0 as usize]
                    .as_ref()
                    .and_then(|n| n.modulation_output(block_start));
                if let Some(node) = self.nodes[target.0 as usize].as_mut() {
                    node.set_override(param, value);
                    node.begin_block(block_start, sr);
                }
            }

            for sample in chunk.iter_mut() {
                let t = self.now();
                for &i in &plan.order {
                    let input: f32 = plan.inputs[i].iter().map(|&j| self.outputs[j]).sum();
                    if let Some(node) = self.nodes[i].as_mut() {
                        self.outputs[i] = node.process(input, t, sr);
                    }
                }
                let mut mix: f32 = plan.to_destination.iter().map(|&i| self.outputs[i]).sum();
                mix += self.next_clip_sample();
                *sample = mix.clamp(-1.0, 1.0);
                self.frame += 1;
            }
        }

        self.plan = Some(plan);
    }

    fn next_clip_sample(&mut self) -> f32 {
        let mut mix = 0.0;
        for clip in self.clips.iter_mut() {
            if let Some(s) = clip.samples.get(clip.pos) {
                mix += *s;
                clip.pos += 1;
            }
        }
        while let Some(pos) = self.clips.iter().position(|c| c.pos >= c.samples.len()) {
            if let Some(mut clip) = self.clips.remove(pos) {
                if let Some(done) = clip.done.take() {
                    let _ = done.send(true);
                }
            }
        }
        mix
    }
}

/// 软件合成后端
pub struct SoftwareBackend {
    state: Mutex<GraphState>,
    next_clip: AtomicU64,
}

impl SoftwareBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Mutex::new(GraphState {
                sample_rate,
                frame: 0,
                running: false,
                nodes: Vec::new(),
                edges: Vec::new(),
                modulations: Vec::new(),
                plan: None,
                outputs: Vec::new(),
                clips: VecDeque::new(),
            }),
            next_clip: AtomicU64::new(1),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// 渲染下一块样本；上下文未启动时输出静音且时钟不走
    pub fn render(&self, out: &mut [f32]) {
        let mut state = self.lock();
        if state.running {
            state.render(out);
        } else {
            out.fill(0.0);
        }
    }

    /// 推进时钟（离线渲染并丢弃输出）
    pub fn advance(&self, secs: f64) {
        let frames = (secs * self.sample_rate() as f64).round() as usize;
        let mut buf = vec![0.0f32; CONTROL_BLOCK];
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(CONTROL_BLOCK);
            self.render(&mut buf[..n]);
            remaining -= n;
        }
    }

    /// 混入一段语音（单声道，已是后端采样率）
    ///
    /// 播放完毕时 `done` 收到 `true`，被停止时收到 `false`
    pub fn play_clip(&self, samples: Vec<f32>, done: oneshot::Sender<bool>) -> u64 {
        let id = self.next_clip.fetch_add(1, Ordering::Relaxed);
        if samples.is_empty() {
            let _ = done.send(true);
            return id;
        }
        self.lock().clips.push_back(Clip {
            id,
            samples,
            pos: 0,
            done: Some(done),
        });
        id
    }

    pub fn stop_clip(&self, id: u64) {
        let mut state = self.lock();
        if let Some(pos) = state.clips.iter().position(|c| c.id == id) {
            if let Some(mut clip) = state.clips.remove(pos) {
                if let Some(done) = clip.done.take() {
                    let _ = done.send(false);
                }
            }
        }
    }

    pub fn stop_clips(&self) {
        let mut state = self.lock();
        for mut clip in state.clips.drain(..) {
            if let Some(done) = clip.done.take() {
                let _ = done.send(false);
            }
        }
    }

    pub fn active_clips(&self) -> usize {
        self.lock().clips.len()
    }

    /// 当前所有音频连接（`None` 为最终输出）
    pub fn connections(&self) -> Vec<(NodeId, Option<NodeId>)> {
        self.lock().edges.clone()
    }

    pub fn modulations(&self) -> Vec<(NodeId, NodeId, ParamId)> {
        self.lock().modulations.clone()
    }

    pub fn node_kind(&self, node: NodeId) -> Option<&'static str> {
        self.lock().node(node).ok().map(|n| n.kind())
    }

    pub fn is_muted(&self, node: NodeId) -> bool {
        self.lock().node(node).map(|n| n.is_muted()).unwrap_or(false)
    }

    pub fn tone_of(&self, node: NodeId) -> Option<Tone> {
        self.lock().node(node).ok().and_then(|n| n.tone())
    }

    pub fn sounding_voices(&self, node: NodeId) -> usize {
        self.lock()
            .node(node)
            .map(|n| n.sounding_voices())
            .unwrap_or(0)
    }

    pub fn is_prepared(&self, node: NodeId) -> bool {
        self.lock()
            .node(node)
            .map(|n| n.is_prepared())
            .unwrap_or(false)
    }
}

#[async_trait]
impl AudioBackendPort for SoftwareBackend {
    async fn resume(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&state.sample_rate) {
            return Err(BackendError::ContextUnavailable(format!(
                "unsupported sample rate {}",
                state.sample_rate
            )));
        }
        if !state.running {
            state.running = true;
            tracing::info!(sample_rate = state.sample_rate, "Audio context started");
        }
        Ok(())
    }

    fn now(&self) -> f64 {
        self.lock().now()
    }

    fn create(&self, spec: NodeSpec) -> Result<NodeId, BackendError> {
        let mut state = self.lock();
        let id = NodeId(state.nodes.len() as u32);
        let sr = state.sample_rate.max(1) as f32;
        state.nodes.push(Some(Node::new(&spec, sr, id.0 as u64 + 1)));
        state.plan = None;
        tracing::trace!(node = %id, kind = spec.kind(), "Node created");
        Ok(id)
    }

    async fn prepare(&self, node: NodeId) -> Result<(), BackendError> {
        let mut state = self.lock();
        let sr = state.sample_rate.max(1) as f32;
        state.node_mut(node)?.prepare(sr);
        Ok(())
    }

    fn connect(&self, from: NodeId, to: Option<NodeId>) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.node(from)?;
        if let Some(to) = to {
            state.node(to)?;
            if from == to || state.reaches(to, from) {
                return Err(BackendError::InvalidConnection(format!(
                    "{} -> {} would create a cycle",
                    from, to
                )));
            }
        }
        if !state.edges.contains(&(from, to)) {
            state.edges.push((from, to));
            state.plan = None;
        }
        Ok(())
    }

    fn modulate(&self, source: NodeId, target: NodeId, param: ParamId) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !state.node(source)?.is_source() {
            return Err(BackendError::InvalidConnection(format!(
                "{} is not a modulation source",
                source
            )));
        }
        if !state.node(target)?.supports(param) {
            return Err(BackendError::UnsupportedParam {
                node: target,
                param,
            });
        }
        state.modulations.retain(|(_, t, p)| !(*t == target && *p == param));
        state.modulations.push((source, target, param));
        Ok(())
    }

    fn start(&self, node: NodeId, at: f64) -> Result<(), BackendError> {
        let mut state = self.lock();
        let n = state.node_mut(node)?;
        if !n.is_source() {
            return Err(BackendError::InvalidConnection(format!("{} is not a source", node)));
        }
        n.schedule_start(at);
        Ok(())
    }

    fn stop(&self, node: NodeId, at: f64) -> Result<(), BackendError> {
        let mut state = self.lock();
        let n = state.node_mut(node)?;
        if !n.is_source() {
            return Err(BackendError::InvalidConnection(format!("{} is not a source", node)));
        }
        n.schedule_stop(at);
        Ok(())
    }

    fn set_param(
        &self,
        node: NodeId,
        param: ParamId,
        value: f32,
        at: f64,
    ) -> Result<(), BackendError> {
        if !value.is_finite() {
            return Err(BackendError::InvalidValue(format!("{param:?} = {value}")));
        }
        let mut state = self.lock();
        let timeline = state
            .node_mut(node)?
            .param_mut(param)
            .ok_or(BackendError::UnsupportedParam { node, param })?;
        timeline.set(value, at);
        Ok(())
    }

    fn ramp_param(
        &self,
        node: NodeId,
        param: ParamId,
        target: f32,
        at: f64,
        duration: f64,
    ) -> Result<(), BackendError> {
        if !target.is_finite() || !duration.is_finite() {
            return Err(BackendError::InvalidValue(format!("{param:?} -> {target}")));
        }
        let mut state = self.lock();
        let timeline = state
            .node_mut(node)?
            .param_mut(param)
            .ok_or(BackendError::UnsupportedParam { node, param })?;
        timeline.ramp(target, at, duration);
        Ok(())
    }

    fn set_tone(&self, node: NodeId, tone: Tone) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !state.node_mut(node)?.set_tone(tone) {
            return Err(BackendError::InvalidConnection(format!(
                "{} has no waveform",
                node
            )));
        }
        Ok(())
    }

    fn set_muted(&self, node: NodeId, muted: bool) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.node_mut(node)?.set_muted(muted);
        Ok(())
    }

    fn trigger(
        &self,
        synth: NodeId,
        frequency: f32,
        detune_cents: f32,
        gate: f64,
        at: f64,
    ) -> Result<(), BackendError> {
        if !frequency.is_finite() || frequency <= 0.0 || !detune_cents.is_finite() {
            return Err(BackendError::InvalidValue(format!(
                "note {frequency} Hz / {detune_cents} cents"
            )));
        }
        let mut state = self.lock();
        let node = state.node_mut(synth)?;
        if !node.is_synth() {
            return Err(BackendError::InvalidConnection(format!("{} is not a synth", synth)));
        }
        if let Some(last) = node.last_trigger() {
            if at <= last {
                return Err(BackendError::NonMonotonicTime {
                    requested: at,
                    last,
                });
            }
        }
        node.trigger(
            frequency * super::dsp::cents_ratio(detune_cents),
            gate.max(0.0),
            at,
        );
        Ok(())
    }

    fn param_value(&self, node: NodeId, param: ParamId) -> Option<f32> {
        let state = self.lock();
        let t = state.now();
        state.node(node).ok().and_then(|n| n.param_value(param, t))
    }

    fn is_active(&self, node: NodeId) -> bool {
        let state = self.lock();
        let t = state.now();
        state.node(node).map(|n| n.is_active(t)).unwrap_or(false)
    }

    fn dispose(&self, node: NodeId) {
        let mut state = self.lock();
        if let Some(slot) = state.nodes.get_mut(node.0 as usize) {
            if slot.take().is_some() {
                state.edges.retain(|(a, b)| *a != node && *b != Some(node));
                state
                    .modulations
                    .retain(|(s, t, _)| *s != node && *t != node);
                state.plan = None;
                tracing::trace!(node = %node, "Node disposed");
            }
        }
    }

    fn node_count(&self) -> usize {
        self.lock().nodes.iter().filter(|n| n.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::Envelope;

    const SR: u32 = 8_000;

    fn envelope() -> Envelope {
        Envelope {
            attack: 0.01,
            decay: 0.05,
            sustain: 0.5,
            release: 0.1,
        }
    }

    #[tokio::test]
    async fn test_resume_rejects_invalid_sample_rate() {
        let backend = SoftwareBackend::new(0);
        assert!(matches!(
            backend.resume().await,
            Err(BackendError::ContextUnavailable(_))
        ));
        assert!(!backend.is_running());
    }

    #[tokio::test]
    async fn test_clock_advances_only_when_running() {
        let backend = SoftwareBackend::new(SR);
        backend.advance(1.0);
        assert_eq!(backend.now(), 0.0);

        backend.resume().await.unwrap();
        backend.advance(0.5);
        assert!((backend.now() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_oscillator_renders_through_volume() {
        let backend = SoftwareBackend::new(SR);
        backend.resume().await.unwrap();
        let osc = backend
            .create(NodeSpec::Oscillator {
                tone: Tone::Square,
                frequency: 100.0,
                detune_cents: 0.0,
            })
            .unwrap();
        let vol = backend.create(NodeSpec::Volume { gain_db: -6.0 }).unwrap();
        backend.connect(osc, Some(vol)).unwrap();
        backend.connect(vol, None).unwrap();
        backend.start(osc, 0.0).unwrap();

        let mut buf = vec![0.0; 400];
        backend.render(&mut buf);
        let peak = buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.501).abs() < 0.01, "peak {peak}");

        backend.set_muted(vol, true).unwrap();
        backend.render(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.0));
    }

    #[tokio::test]
    async fn test_source_stops_at_scheduled_time() {
        let backend = SoftwareBackend::new(SR);
        backend.resume().await.unwrap();
        let noise = backend
            .create(NodeSpec::Noise {
                color: crate::application::ports::NoiseColor::White,
            })
            .unwrap();
        backend.start(noise, 0.0).unwrap();
        backend.stop(noise, 0.25).unwrap();
        assert!(backend.is_active(noise));
        backend.advance(0.3);
        assert!(!backend.is_active(noise));
    }

    #[tokio::test]
    async fn test_connect_rejects_cycles() {
        let backend = SoftwareBackend::new(SR);
        let a = backend.create(NodeSpec::Volume { gain_db: 0.0 }).unwrap();
        let b = backend.create(NodeSpec::Volume { gain_db: 0.0 }).unwrap();
        backend.connect(a, Some(b)).unwrap();
        assert!(matches!(
            backend.connect(b, Some(a)),
            Err(BackendError::InvalidConnection(_))
        ));
        assert!(backend.connect(a, Some(a)).is_err());
    }

    #[tokio::test]
    async fn test_trigger_requires_increasing_time() {
        let backend = SoftwareBackend::new(SR);
        backend.resume().await.unwrap();
        let synth = backend
            .create(NodeSpec::Synth {
                tone: Tone::Sine,
                envelope: envelope(),
            })
            .unwrap();
        backend.trigger(synth, 440.0, 0.0, 0.1, 0.5).unwrap();
        assert!(matches!(
            backend.trigger(synth, 440.0, 0.0, 0.1, 0.5),
            Err(BackendError::NonMonotonicTime { .. })
        ));
        assert!(backend.trigger(synth, 440.0, 0.0, 0.1, 0.4).is_err());
        assert!(backend.trigger(synth, f32::NAN, 0.0, 0.1, 0.6).is_err());
        backend.trigger(synth, 440.0, 3.0, 0.1, 0.6).unwrap();
        assert_eq!(backend.sounding_voices(synth), 2);
    }

    #[tokio::test]
    async fn test_synth_voices_released() {
        let backend = SoftwareBackend::new(SR);
        backend.resume().await.unwrap();
        let synth = backend
            .create(NodeSpec::Synth {
                tone: Tone::Triangle,
                envelope: envelope(),
            })
            .unwrap();
        backend.connect(synth, None).unwrap();
        backend.trigger(synth, 330.0, 0.0, 0.1, 0.0).unwrap();
        backend.advance(0.05);
        assert!(backend.is_active(synth));
        backend.advance(0.3);
        assert!(!backend.is_active(synth));
        assert_eq!(backend.sounding_voices(synth), 0);
    }

    #[tokio::test]
    async fn test_lfo_modulates_cutoff() {
        let backend = SoftwareBackend::new(SR);
        backend.resume().await.unwrap();
        let lfo = backend
            .create(NodeSpec::Lfo {
                frequency: 1.0,
                min: 300.0,
                max: 900.0,
            })
            .unwrap();
        let filter = backend
            .create(NodeSpec::LowPass {
                cutoff_hz: 5000.0,
                q: 1.0,
            })
            .unwrap();
        backend.modulate(lfo, filter, ParamId::Cutoff).unwrap();
        backend.start(lfo, 0.0).unwrap();
        backend.advance(0.3);
        let cutoff = backend.param_value(filter, ParamId::Cutoff).unwrap();
        assert!((300.0..=900.0).contains(&cutoff), "cutoff {cutoff}");

        assert!(matches!(
            backend.modulate(lfo, filter, ParamId::GainDb),
            Err(BackendError::UnsupportedParam { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispose_removes_connections() {
        let backend = SoftwareBackend::new(SR);
        let a = backend.create(NodeSpec::Volume { gain_db: 0.0 }).unwrap();
        let b = backend.create(NodeSpec::Volume { gain_db: 0.0 }).unwrap();
        backend.connect(a, Some(b)).unwrap();
        backend.connect(b, None).unwrap();
        backend.dispose(b);
        assert_eq!(backend.node_count(), 1);
        assert!(backend.connections().is_empty());
        assert!(matches!(
            backend.set_param(b, ParamId::GainDb, 0.0, 0.0),
            Err(BackendError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clip_completion_and_stop() {
        let backend = SoftwareBackend::new(SR);
        backend.resume().await.unwrap();

        let (tx, rx) = oneshot::channel();
        backend.play_clip(vec![0.1; 100], tx);
        backend.advance(0.02);
        assert!(rx.await.unwrap());

        let (tx, rx) = oneshot::channel();
        backend.play_clip(vec![0.1; 10_000], tx);
        backend.stop_clips();
        assert!(!rx.await.unwrap());
        assert_eq!(backend.active_clips(), 0);
    }

    #[tokio::test]
    async fn test_reverb_prepare() {
        let backend = SoftwareBackend::new(SR);
        let reverb = backend
            .create(NodeSpec::Reverb {
                decay_secs: 2.0,
                wet: 0.4,
            })
            .unwrap();
        assert!(!backend.is_prepared(reverb));
        backend.prepare(reverb).await.unwrap();
        assert!(backend.is_prepared(reverb));
    }
}

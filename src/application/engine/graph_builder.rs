//! Graph Builder - 将 SignalPath 实例化为后端节点

use crate::application::ports::{AudioBackendPort, BackendError, NodeId, NodeSpec};

use super::signal_path::{SignalPath, Stage};

/// 已实例化的通路
#[derive(Debug, Clone)]
pub struct BuiltPath {
    name: String,
    nodes: Vec<(&'static str, NodeId)>,
    /// 需要 start / stop 的节点
    startable: Vec<NodeId>,
    output: NodeId,
}

impl BuiltPath {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, label: &str) -> Option<NodeId> {
        self.nodes.iter().find(|(l, _)| *l == label).map(|(_, id)| *id)
    }

    pub fn startable(&self) -> &[NodeId] {
        &self.startable
    }

    /// 通路最后一级
    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|(_, id)| *id)
    }

    /// 按创建的逆序释放
    pub fn dispose(&self, backend: &dyn AudioBackendPort) {
        for (_, id) in self.nodes.iter().rev() {
            backend.dispose(*id);
        }
    }
}

fn create_stage(
    backend: &dyn AudioBackendPort,
    stage: &Stage,
    built: &mut BuiltPath,
) -> Result<NodeId, BackendError> {
    let id = backend.create(stage.spec.clone())?;
    built.nodes.push((stage.label, id));
    if stage.spec.is_source() {
        built.startable.push(id);
    }
    Ok(id)
}

async fn materialize(
    backend: &dyn AudioBackendPort,
    path: &SignalPath,
    output: Option<NodeId>,
    built: &mut BuiltPath,
) -> Result<(), BackendError> {
    let mut sources = Vec::with_capacity(path.sources.len());
    for stage in &path.sources {
        sources.push(create_stage(backend, stage, built)?);
    }

    let mut chain = Vec::with_capacity(path.chain.len());
    for stage in &path.chain {
        let id = create_stage(backend, stage, built)?;
        if matches!(stage.spec, NodeSpec::Reverb { .. }) {
            backend.prepare(id).await?;
        }
        chain.push(id);
    }

    for m in &path.modulations {
        let source = create_stage(backend, &m.source, built)?;
        let target = built.node(m.target).ok_or_else(|| {
            BackendError::InvalidConnection(format!(
                "{}: no stage labelled '{}'",
                path.name, m.target
            ))
        })?;
        backend.modulate(source, target, m.param)?;
    }

    match chain.first() {
        Some(&head) => {
            for &s in &sources {
                backend.connect(s, Some(head))?;
            }
            for pair in chain.windows(2) {
                backend.connect(pair[0], Some(pair[1]))?;
            }
        }
        None if sources.len() > 1 => {
            return Err(BackendError::InvalidConnection(format!(
                "{}: several sources need at least one stage",
                path.name
            )));
        }
        None => {}
    }

    let tail = chain
        .last()
        .or_else(|| sources.last())
        .copied()
        .ok_or_else(|| BackendError::InvalidConnection(format!("{}: empty path", path.name)))?;
    backend.connect(tail, output)?;
    built.output = tail;
    Ok(())
}

/// 实例化通路并连接到 `output`（`None` 为最终输出）
///
/// 失败时释放本通路已创建的节点
pub async fn build_path(
    backend: &dyn AudioBackendPort,
    path: &SignalPath,
    output: Option<NodeId>,
) -> Result<BuiltPath, BackendError> {
    let mut built = BuiltPath {
        name: path.name.clone(),
        nodes: Vec::new(),
        startable: Vec::new(),
        output: NodeId(0),
    };

    match materialize(backend, path, output, &mut built).await {
        Ok(()) => {
            tracing::debug!(
                path = %path.name,
                nodes = built.nodes.len(),
                "Signal path built"
            );
            Ok(built)
        }
        Err(e) => {
            built.dispose(backend);
            Err(e)
        }
    }
}

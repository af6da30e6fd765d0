use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CodeNode, EdgeKind, GraphView, NodeId};
use crate::error::{EngineError, EngineResult};

/// Edge record of a graph snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// Serialized form of a graph as produced by the scanner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<CodeNode>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// In-memory adjacency graph
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    nodes: HashMap<NodeId, CodeNode>,
    /// Outgoing edges in insertion order
    outgoing: HashMap<NodeId, Vec<(NodeId, EdgeKind)>>,
    /// Incoming edges in insertion order
    incoming: HashMap<NodeId, Vec<(NodeId, EdgeKind)>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node
    pub fn add_node(&mut self, node: CodeNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add a directed edge; both endpoints must already exist
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> EngineResult<()> {
        if !self.nodes.contains_key(from) {
            return Err(EngineError::node_not_found(from));
        }
        if !self.nodes.contains_key(to) {
            return Err(EngineError::node_not_found(to));
        }

        self.outgoing
            .entry(from.to_string())
            .or_default()
            .push((to.to_string(), kind));
        self.incoming
            .entry(to.to_string())
            .or_default()
            .push((from.to_string(), kind));
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    /// Build a graph from a snapshot, rejecting edges to unknown nodes
    pub fn from_snapshot(snapshot: GraphSnapshot) -> EngineResult<Self> {
        let mut graph = Self::new();
        for node in snapshot.nodes {
            graph.add_node(node);
        }
        for edge in &snapshot.edges {
            graph.add_edge(&edge.from, &edge.to, edge.kind)?;
        }

        debug!(
            "Built graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Load a JSON snapshot from disk
    pub fn load_snapshot(path: &Path) -> EngineResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::io_error(e, Some(path)))?;
        let snapshot: GraphSnapshot = serde_json::from_str(&content)?;
        info!(
            "Loaded graph snapshot from {} ({} nodes)",
            path.display(),
            snapshot.nodes.len()
        );
        Self::from_snapshot(snapshot)
    }

    fn neighbor_ids(&self, id: &str) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = Vec::new();
        let out = self.outgoing.get(id).into_iter().flatten();
        let inc = self.incoming.get(id).into_iter().flatten();

        for (other, _) in out.chain(inc) {
            if other != id && !ids.contains(&other) {
                ids.push(other);
            }
        }
        ids
    }
}

impl GraphView for MemoryGraph {
    fn node(&self, id: &str) -> Option<CodeNode> {
        self.nodes.get(id).cloned()
    }

    fn neighbors(&self, id: &str) -> Vec<CodeNode> {
        self.neighbor_ids(id)
            .into_iter()
            .filter_map(|other| self.nodes.get(other).cloned())
            .collect()
    }
}

/// Graph guarded by a read/write lock so the scanner can swap in a rebuilt
/// graph while searches keep a handle to the same accessor
#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<MemoryGraph>>,
}

impl SharedGraph {
    pub fn new(graph: MemoryGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    /// Replace the whole graph after a rescan
    pub fn replace(&self, graph: MemoryGraph) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        info!(
            "Replacing graph: {} -> {} nodes",
            guard.node_count(),
            graph.node_count()
        );
        *guard = graph;
    }

    pub fn node_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .node_count()
    }
}

impl GraphView for SharedGraph {
    fn node(&self, id: &str) -> Option<CodeNode> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).node(id)
    }

    fn neighbors(&self, id: &str) -> Vec<CodeNode> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .neighbors(id)
    }
}

// Read-only view of the code dependency graph
// The graph is built and refreshed by the scanning pipeline; the engine only reads it

pub mod memory;

pub use memory::{EdgeSpec, GraphSnapshot, MemoryGraph, SharedGraph};

use serde::{Deserialize, Serialize};

/// Identifier of a graph node
pub type NodeId = String;

/// Kind of code entity a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Module,
    Function,
    Method,
    Struct,
    Interface,
    Type,
    Variable,
    Other,
}

impl NodeKind {
    /// Kinds that usually answer a code search directly
    pub fn is_high_value(self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Struct | NodeKind::Interface)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Module => "module",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Struct => "struct",
            NodeKind::Interface => "interface",
            NodeKind::Type => "type",
            NodeKind::Variable => "variable",
            NodeKind::Other => "other",
        }
    }
}

/// Visibility of a code entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// Relation carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Contains,
    Imports,
    Calls,
}

/// A node of the code graph as seen by the search engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// Short summary of what the entity is for
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub documentation: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub visibility: Visibility,
}

impl CodeNode {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: String::new(),
            purpose: String::new(),
            documentation: String::new(),
            kind,
            visibility: Visibility::Private,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    pub fn is_exported(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// Read-only accessor the engine consumes
///
/// Implementations must be safe to call from several searches at once.
pub trait GraphView: Send + Sync {
    /// Look up a node by id
    fn node(&self, id: &str) -> Option<CodeNode>;

    /// All nodes reachable by exactly one edge, in either direction
    ///
    /// The order must be stable for a given graph so that greedy tie-breaks
    /// are reproducible.
    fn neighbors(&self, id: &str) -> Vec<CodeNode>;
}

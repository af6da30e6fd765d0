// graph-rl-search - Reinforcement-learning code search over a dependency graph
// TD(λ) walks and MCTS share one value store that learns from every search and from user feedback

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod logging;
pub mod reinforcement;
pub mod search;
pub mod sql;

pub use config::EngineConfig;
pub use engine::CodeSearchEngine;
pub use error::{EngineError, EngineResult};
pub use graph::{CodeNode, GraphView, MemoryGraph, NodeKind, SharedGraph};
pub use logging::init_with_logger;
pub use reinforcement::LearningStats;
pub use search::{SearchControl, SearchResult};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

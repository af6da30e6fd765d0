// Search engine facade
// Wires the graph, the value store and both strategies together; constructed once and shared

use std::sync::Arc;

use tracing::info;

use crate::config::{EngineConfig, LearningConfig, RescanPolicy, StorageBackend};
use crate::error::EngineResult;
use crate::graph::{MemoryGraph, NodeId, SharedGraph};
use crate::reinforcement::{
    q_learning::QLearningCore,
    reward::RelevanceScorer,
    td_lambda::{LearningStats, TdLearningEngine},
    value_store::{MemoryValueStore, ValueStore},
};
use crate::search::{mcts::MctsEngine, SearchControl, SearchResult};
use crate::sql::SqliteValueStore;

/// Reinforcement-learning code search over a shared graph
///
/// All methods take `&self`; wrap the engine in an `Arc` to share it between
/// tasks. Each call builds its own traces and search tree.
pub struct CodeSearchEngine {
    graph: SharedGraph,
    store: Arc<dyn ValueStore>,
    rescan_policy: RescanPolicy,
    td: TdLearningEngine,
    mcts: MctsEngine,
}

impl CodeSearchEngine {
    pub fn new(
        graph: SharedGraph,
        store: Arc<dyn ValueStore>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let core = QLearningCore::new(Arc::new(graph.clone()), store.clone());
        let scorer = RelevanceScorer::new(config.scoring.clone());
        let td = TdLearningEngine::new(
            core.clone(),
            scorer.clone(),
            config.learning.clone(),
            config.walk.clone(),
        )?;
        let mcts = MctsEngine::new(core, scorer, config.mcts.clone());

        Ok(Self {
            graph,
            store,
            rescan_policy: config.rescan_policy,
            td,
            mcts,
        })
    }

    /// Build an engine with the value store named by `config.storage`
    pub fn from_config(graph: SharedGraph, config: EngineConfig) -> EngineResult<Self> {
        let store: Arc<dyn ValueStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryValueStore::new()),
            StorageBackend::Sqlite => {
                Arc::new(SqliteValueStore::open(&config.storage.database_path())?)
            }
        };
        Self::new(graph, store, config)
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn ValueStore> {
        &self.store
    }

    /// MCTS search with no deadline beyond the configured budget
    pub fn search(&self, query: &str, start: &str) -> EngineResult<SearchResult> {
        self.search_with_control(query, start, &SearchControl::unbounded())
    }

    pub fn search_with_control(
        &self,
        query: &str,
        start: &str,
        control: &SearchControl,
    ) -> EngineResult<SearchResult> {
        self.mcts.search(query, start, control)
    }

    pub fn search_with_td_learning(&self, query: &str, start: &str) -> EngineResult<SearchResult> {
        self.search_with_td_learning_control(query, start, &SearchControl::unbounded())
    }

    pub fn search_with_td_learning_control(
        &self,
        query: &str,
        start: &str,
        control: &SearchControl,
    ) -> EngineResult<SearchResult> {
        self.td.search_with_td_learning(query, start, control)
    }

    /// Reinforce a path the user confirmed; `path[0]` is where the search started
    pub fn learn_from_feedback(
        &self,
        query: &str,
        path: &[NodeId],
        satisfaction: f64,
    ) -> EngineResult<()> {
        self.td.learn_from_feedback(query, path, satisfaction)
    }

    pub fn learning_stats(&self) -> LearningStats {
        self.td.learning_stats()
    }

    pub fn learning_config(&self) -> LearningConfig {
        self.td.learning_config()
    }

    pub fn update_learning_config(&self, config: LearningConfig) -> EngineResult<()> {
        self.td.update_learning_config(config)
    }

    /// Swap in a rebuilt graph and apply the rescan policy to learned values
    pub fn on_graph_rebuilt(&self, graph: MemoryGraph) -> EngineResult<()> {
        let nodes = graph.node_count();
        self.graph.replace(graph);

        match self.rescan_policy {
            RescanPolicy::Retain => {
                info!(
                    "Graph rebuilt with {} nodes; keeping {} learned values",
                    nodes,
                    self.store.len()?
                );
            }
            RescanPolicy::Reset => {
                crate::track_error!(self.store.clear(), "Failed to reset learned values")?;
                info!("Graph rebuilt with {} nodes; learned values reset", nodes);
            }
        }
        Ok(())
    }
}

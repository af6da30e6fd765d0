// Q-Learning policy over the code graph
// Actions are the edges leaving the current node; values come from the value store

use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::graph::{CodeNode, GraphView};
use crate::reinforcement::{
    action::Action,
    state::{SearchState, StateEncoder, StateKey, ValueKey},
    value_store::ValueStore,
    Policy,
};

/// An action together with the node it leads to and its current value
#[derive(Debug, Clone)]
pub struct ScoredAction {
    pub action: Action,
    pub target: CodeNode,
    pub value: f64,
}

/// Greedy Q-learning policy backed by a value store
#[derive(Clone)]
pub struct QLearningCore {
    graph: Arc<dyn GraphView>,
    store: Arc<dyn ValueStore>,
    encoder: StateEncoder,
}

impl QLearningCore {
    pub fn new(graph: Arc<dyn GraphView>, store: Arc<dyn ValueStore>) -> Self {
        Self {
            graph,
            store,
            encoder: StateEncoder::new(),
        }
    }

    pub fn graph(&self) -> &Arc<dyn GraphView> {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn ValueStore> {
        &self.store
    }

    pub fn encoder(&self) -> &StateEncoder {
        &self.encoder
    }

    pub fn state_key(&self, state: &SearchState) -> StateKey {
        self.encoder.encode(state)
    }

    pub fn value_key(&self, state: &SearchState, action: &Action) -> ValueKey {
        ValueKey::new(self.state_key(state), action.label.clone())
    }

    /// Stored value of a pair, 0.0 when never written
    pub fn get_q_value(&self, state: &SearchState, action: &Action) -> EngineResult<f64> {
        Ok(self
            .store
            .get_value(&self.value_key(state, action))?
            .unwrap_or(0.0))
    }

    /// Best stored value for a state, 0.0 when nothing was written
    pub fn get_max_q_value(&self, key: &StateKey) -> EngineResult<f64> {
        Ok(self
            .store
            .get_best_value(key)?
            .map(|(_, value)| value)
            .unwrap_or(0.0))
    }

    /// One action per neighbor of the current node, in graph order
    pub fn available_actions(&self, state: &SearchState) -> Vec<(Action, CodeNode)> {
        self.graph
            .neighbors(&state.node_id)
            .into_iter()
            .map(|node| (Action::move_to(node.id.clone()), node))
            .collect()
    }

    /// Highest-valued neighbor move; the earliest neighbor wins ties
    pub fn best_action(&self, state: &SearchState) -> EngineResult<ScoredAction> {
        let mut best: Option<ScoredAction> = None;

        for (action, target) in self.available_actions(state) {
            let value = self.get_q_value(state, &action)?;
            match &best {
                Some(current) if value <= current.value => {}
                _ => {
                    best = Some(ScoredAction {
                        action,
                        target,
                        value,
                    })
                }
            }
        }

        let best = best.ok_or_else(|| EngineError::no_actions(state.node_id.clone()))?;
        debug!(
            "Best action from {} at depth {}: {} ({:.4})",
            state.node_id, state.depth, best.action.label, best.value
        );
        Ok(best)
    }
}

impl Policy for QLearningCore {
    fn action_value(&self, state: &SearchState, action: &Action) -> EngineResult<f64> {
        self.get_q_value(state, action)
    }

    fn select_action(&self, state: &SearchState) -> EngineResult<ScoredAction> {
        self.best_action(state)
    }
}

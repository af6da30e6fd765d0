// Reinforcement learning components of the search engine
// Q-values over (state, action) pairs, learned with TD(λ) and stored behind `ValueStore`

pub mod action;
pub mod q_learning;
pub mod reward;
pub mod state;
pub mod td_lambda;
pub mod traces;
pub mod value_store;

pub use action::{Action, Experience};
pub use q_learning::{QLearningCore, ScoredAction};
pub use reward::{RelevanceScorer, ScoringWeights};
pub use state::{SearchState, StateEncoder, StateKey, ValueKey};
pub use td_lambda::{Episode, LearningStats, TdLearningEngine, TraceOrigin};
pub use traces::EligibilityTraceSet;
pub use value_store::{MemoryValueStore, ValueEntry, ValueStore, ValueUpdate};

use crate::error::EngineResult;

/// Interface of a policy choosing moves through the graph
pub trait Policy {
    /// Current value of taking `action` in `state`
    fn action_value(&self, state: &SearchState, action: &Action) -> EngineResult<f64>;

    /// The move the policy would take from `state`
    fn select_action(&self, state: &SearchState) -> EngineResult<ScoredAction>;
}

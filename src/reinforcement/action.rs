// Actions available to the search agent
// Every action crosses exactly one graph edge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::reinforcement::state::SearchState;

/// Prefix of the label given to move actions
const MOVE_PREFIX: &str = "move_to:";

/// A move from the current node to one of its neighbors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Label stored in the value table
    pub label: String,
    /// Node the action leads to
    pub target: NodeId,
}

impl Action {
    /// Move to the given neighbor
    pub fn move_to(target: impl Into<NodeId>) -> Self {
        let target = target.into();
        Self {
            label: format!("{}{}", MOVE_PREFIX, target),
            target,
        }
    }
}

/// One recorded transition of a search episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub state: SearchState,
    pub action: Action,
    pub reward: f64,
    pub next_state: SearchState,
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

impl Experience {
    pub fn new(state: SearchState, action: Action, reward: f64, next_state: SearchState) -> Self {
        let query = state.query.clone();
        Self {
            state,
            action,
            reward,
            next_state,
            query,
            timestamp: Utc::now(),
        }
    }
}

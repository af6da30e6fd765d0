// Search strategies over the code graph
// MCTS for planning-style search; the TD(λ) walk lives in `reinforcement::td_lambda`

pub mod mcts;
pub mod result;
pub mod tree;

pub use mcts::{MctsEngine, TreeSearch};
pub use result::{ExperienceLog, SearchControl, SearchResult, StopReason};
pub use tree::{NodeHandle, SearchTree, SearchTreeNode};

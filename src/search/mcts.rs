// Monte Carlo Tree Search over the code graph
// Select with UCB1, expand one random untried move, evaluate the leaf, back up the value

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MctsConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::{CodeNode, NodeId, NodeKind};
use crate::reinforcement::{
    action::{Action, Experience},
    q_learning::QLearningCore,
    reward::RelevanceScorer,
    state::{require_terms, SearchState},
};
use crate::search::result::{SearchControl, SearchResult, StopReason};
use crate::search::tree::{NodeHandle, SearchTree, SearchTreeNode};

/// A grown tree together with how the growth ended
#[derive(Debug)]
pub struct TreeSearch {
    pub tree: SearchTree,
    pub iterations: usize,
    pub stop: StopReason,
    pub experiences: Vec<Experience>,
}

/// Tree search that reads, but never writes, learned values
pub struct MctsEngine {
    q_learning: QLearningCore,
    scorer: RelevanceScorer,
    config: MctsConfig,
}

impl MctsEngine {
    pub fn new(q_learning: QLearningCore, scorer: RelevanceScorer, config: MctsConfig) -> Self {
        Self {
            q_learning,
            scorer,
            config,
        }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Moves out of the node `state` stands on, skipping nodes already on
    /// the path from the root
    fn untried_moves(
        &self,
        state: &SearchState,
        on_path: &BTreeSet<&str>,
    ) -> Vec<(Action, CodeNode)> {
        self.q_learning
            .available_actions(state)
            .into_iter()
            .filter(|(action, _)| !on_path.contains(action.target.as_str()))
            .collect()
    }

    fn make_node(&self, state: SearchState, start: &str, relevance: f64) -> SearchTreeNode {
        let mut on_path: BTreeSet<&str> = state.visited.iter().map(String::as_str).collect();
        on_path.insert(start);
        let untried = self.untried_moves(&state, &on_path);
        let dead_end = self.q_learning.graph().neighbors(&state.node_id).is_empty();
        let terminal = state.depth >= self.config.max_depth || dead_end;
        SearchTreeNode::new(state, untried, relevance, terminal)
    }

    /// Blend of relevance and learned value, decayed by depth, plus a
    /// bonus per distinct node kind on the path from the root
    fn evaluate(&self, node: &SearchTreeNode, root_kind: NodeKind) -> EngineResult<f64> {
        let key = self.q_learning.state_key(&node.state);
        let learned = self.q_learning.get_max_q_value(&key)?;
        let weight = self.config.learned_value_weight;
        let blended = (1.0 - weight) * node.relevance + weight * learned;
        let decay = self.config.depth_decay.powi(node.state.depth as i32);
        // type_counts only covers entered nodes; the root is never entered
        let mut kinds = node.state.type_counts.len();
        if !node.state.type_counts.contains_key(&root_kind) {
            kinds += 1;
        }
        let diversity = self.config.diversity_bonus * kinds as f64;
        Ok(blended * decay + diversity)
    }

    /// Run the four MCTS phases until the budget or the caller stops it
    pub fn grow_tree(
        &self,
        query: &str,
        start: &str,
        control: &SearchControl,
    ) -> EngineResult<TreeSearch> {
        require_terms(query)?;
        let start_node = self
            .q_learning
            .graph()
            .node(start)
            .ok_or_else(|| EngineError::node_not_found(start))?;

        let mut rng = self.rng();
        let log = control.experience_log();
        let budget_deadline =
            control.deadline_within(Duration::from_millis(self.config.time_budget_ms));

        let root_relevance = self.scorer.score(&start_node, query);
        let root = self.make_node(SearchState::initial(start, query), start, root_relevance);
        let mut tree = SearchTree::new(root);
        let mut experiences = Vec::new();
        let mut iterations = 0;
        let mut stop = StopReason::Exhausted;

        while iterations < self.config.max_iterations {
            if let Err(err) = control.check() {
                stop = StopReason::from_error(&err).unwrap_or(StopReason::Cancelled);
                warn!(
                    "MCTS for '{}' stopped after {} iterations: {}",
                    query, iterations, err
                );
                break;
            }
            if Instant::now() >= budget_deadline {
                debug!("MCTS time budget used after {} iterations", iterations);
                break;
            }

            // Selection
            let mut current = tree.root();
            loop {
                let node = tree.get(current);
                if node.terminal || !node.is_fully_expanded() {
                    break;
                }
                match tree.select_child(current, self.config.exploration) {
                    Some(child) => current = child,
                    None => break,
                }
            }

            // Expansion
            if !tree.get(current).terminal && !tree.get(current).is_fully_expanded() {
                let pick = rng.random_range(0..tree.get(current).untried.len());
                let (action, target) = tree.get_mut(current).untried.remove(pick);
                let relevance = self.scorer.score(&target, query);
                let parent_state = tree.get(current).state.clone();
                let child_state = parent_state.execute(&action, target.kind, relevance);

                let experience = Experience::new(
                    parent_state,
                    action.clone(),
                    relevance,
                    child_state.clone(),
                );
                log.push(experience.clone());
                experiences.push(experience);

                let child = self.make_node(child_state, start, relevance);
                current = tree.add_child(current, action, child);
            }

            // Simulation and backpropagation
            let value = self.evaluate(tree.get(current), start_node.kind)?;
            tree.backpropagate(current, value);
            iterations += 1;

            if current == tree.root() && tree.get(current).terminal {
                stop = StopReason::DeadEnd;
                break;
            }
        }

        Ok(TreeSearch {
            tree,
            iterations,
            stop,
            experiences,
        })
    }

    /// Search from `start` and return the most valuable path found
    pub fn search(
        &self,
        query: &str,
        start: &str,
        control: &SearchControl,
    ) -> EngineResult<SearchResult> {
        let started = Instant::now();
        let grown = self.grow_tree(query, start, control)?;
        let tree = &grown.tree;

        let handles = tree.best_path(self.config.max_result_hops);
        let path: Vec<NodeId> = handles
            .iter()
            .map(|&h| tree.get(h).state.node_id.clone())
            .collect();

        let hops: Vec<NodeHandle> = handles.iter().skip(1).copied().collect();
        let confidence = if hops.is_empty() {
            0.0
        } else {
            let total: f64 = hops.iter().map(|&h| tree.get(h).mean_value()).sum();
            let mean = total / hops.len() as f64;
            mean.clamp(0.0, 1.0)
        };
        let relevance = if hops.is_empty() {
            tree.get(tree.root()).relevance
        } else {
            hops.iter().map(|&h| tree.get(h).relevance).sum::<f64>() / hops.len() as f64
        };

        let explanation = match path.last() {
            Some(last) if path.len() > 1 => format!(
                "MCTS ran {} iterations over {} tree nodes and stopped ({}); best path ends at {} after {} hops",
                grown.iterations,
                tree.len(),
                grown.stop.as_str(),
                last,
                path.len() - 1
            ),
            _ => format!(
                "MCTS ran {} iterations and found no move away from the start node ({})",
                grown.iterations,
                grown.stop.as_str()
            ),
        };

        info!(
            "MCTS for '{}' from {}: {} iterations, {} hops, confidence {:.3} ({})",
            query,
            start,
            grown.iterations,
            path.len().saturating_sub(1),
            confidence,
            grown.stop.as_str()
        );

        Ok(SearchResult {
            path,
            confidence,
            relevance,
            explanation,
            metadata: Default::default(),
            experiences: grown.experiences,
        }
        .with_metadata("strategy", "mcts")
        .with_metadata("episode_id", Uuid::new_v4().to_string())
        .with_metadata("start_node", start)
        .with_metadata("iterations", grown.iterations)
        .with_metadata("tree_size", tree.len())
        .with_metadata("stop_reason", grown.stop.as_str())
        .with_metadata("elapsed_ms", started.elapsed().as_millis() as u64))
    }
}

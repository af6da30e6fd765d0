// TD(λ) learning over graph walks
// Drives a bounded greedy walk and credits earlier steps through eligibility traces

use std::sync::{Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{LearningConfig, WalkConfig};
use crate::error::{EngineError, EngineResult};
use crate::graph::{NodeId, NodeKind};
use crate::reinforcement::{
    action::{Action, Experience},
    q_learning::QLearningCore,
    reward::RelevanceScorer,
    state::{require_terms, SearchState},
    traces::EligibilityTraceSet,
    value_store::ValueUpdate,
};
use crate::search::result::{SearchControl, SearchResult, StopReason};

/// Weight of the newest |δ| in the running average
const TD_ERROR_SMOOTHING: f64 = 0.1;

/// Share of the feedback reward lost per step away from the start of the path
const FEEDBACK_STEP_DISCOUNT: f64 = 0.1;

/// Runtime counters of the learner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total_steps: u64,
    /// Exponential moving average of |δ|
    pub average_td_error: f64,
    /// Live traces at the end of the last update
    pub active_traces: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub episodes: u64,
    pub feedback_events: u64,
}

/// Step that last set a trace; its value row is described by this state
/// and reward whenever later steps update it
#[derive(Debug, Clone)]
pub struct TraceOrigin {
    pub state: SearchState,
    pub reward: f64,
}

/// Learning state of one search or feedback replay
///
/// Created fresh per call so that concurrent calls never share traces.
#[derive(Debug, Clone)]
pub struct Episode {
    config: LearningConfig,
    traces: EligibilityTraceSet<TraceOrigin>,
    td_errors: Vec<f64>,
}

impl Episode {
    fn new(config: LearningConfig) -> Self {
        let traces = EligibilityTraceSet::new(config.trace_threshold, config.max_traces);
        Self {
            config,
            traces,
            td_errors: Vec::new(),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn traces(&self) -> &EligibilityTraceSet<TraceOrigin> {
        &self.traces
    }

    pub fn mean_abs_td_error(&self) -> f64 {
        if self.td_errors.is_empty() {
            return 0.0;
        }
        self.td_errors.iter().map(|d| d.abs()).sum::<f64>() / self.td_errors.len() as f64
    }
}

/// Greedy graph walker that learns with TD(λ)
pub struct TdLearningEngine {
    q_learning: QLearningCore,
    scorer: RelevanceScorer,
    walk: WalkConfig,
    config: RwLock<LearningConfig>,
    stats: Mutex<LearningStats>,
}

impl TdLearningEngine {
    pub fn new(
        q_learning: QLearningCore,
        scorer: RelevanceScorer,
        config: LearningConfig,
        walk: WalkConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            q_learning,
            scorer,
            walk,
            config: RwLock::new(config),
            stats: Mutex::new(LearningStats::default()),
        })
    }

    pub fn q_learning(&self) -> &QLearningCore {
        &self.q_learning
    }

    pub fn learning_config(&self) -> LearningConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in new learning parameters; episodes already running keep theirs
    pub fn update_learning_config(&self, config: LearningConfig) -> EngineResult<()> {
        config.validate()?;
        info!(
            "Learning config updated: lambda={} alpha={} gamma={} threshold={} max_traces={}",
            config.lambda,
            config.learning_rate,
            config.discount_factor,
            config.trace_threshold,
            config.max_traces
        );
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn learning_stats(&self) -> LearningStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Start an episode with an empty trace set and the current config
    pub fn begin_episode(&self) -> Episode {
        Episode::new(self.learning_config())
    }

    /// TD(λ) update for one transition; returns the TD error δ
    pub fn td_update(
        &self,
        episode: &mut Episode,
        state: &SearchState,
        action: &Action,
        reward: f64,
        next_state: &SearchState,
    ) -> EngineResult<f64> {
        let config = episode.config.clone();
        let key = self.q_learning.value_key(state, action);
        let next_key = self.q_learning.state_key(next_state);
        let store = self.q_learning.store();

        let current = store.get_value(&key)?.unwrap_or(0.0);
        let next_best = self.q_learning.get_max_q_value(&next_key)?;

        // δ = r + γ·max_a' Q(s',a') - Q(s,a)
        let td_error = reward + config.discount_factor * next_best - current;

        episode.traces.replace(
            key,
            TraceOrigin {
                state: state.clone(),
                reward,
            },
        );
        let decay = config.discount_factor * config.lambda;
        let step = config.learning_rate * td_error;
        episode.traces.apply_and_decay(decay, |traced, trace, origin| {
            let value = store.get_value(traced)?.unwrap_or(0.0);
            store.set_value(ValueUpdate {
                key: traced,
                value: value + step * trace,
                state: &origin.state,
                reward: origin.reward,
                query: &origin.state.query,
            })
        })?;
        episode.traces.enforce_cap();
        episode.td_errors.push(td_error);

        debug!(
            "TD update {} -[{}]-> {}: r={:.4} δ={:.4} traces={}",
            state.node_id,
            action.label,
            next_state.node_id,
            reward,
            td_error,
            episode.traces.len()
        );

        self.record_step(td_error, episode.traces.len());
        Ok(td_error)
    }

    fn record_step(&self, td_error: f64, active_traces: usize) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.average_td_error = if stats.total_steps == 0 {
            td_error.abs()
        } else {
            (1.0 - TD_ERROR_SMOOTHING) * stats.average_td_error + TD_ERROR_SMOOTHING * td_error.abs()
        };
        stats.total_steps += 1;
        stats.active_traces = active_traces;
        stats.last_update = Some(Utc::now());
    }

    /// Walk the graph from `start`, learning from every step
    pub fn search_with_td_learning(
        &self,
        query: &str,
        start: &str,
        control: &SearchControl,
    ) -> EngineResult<SearchResult> {
        require_terms(query)?;
        if self.q_learning.graph().node(start).is_none() {
            return Err(EngineError::node_not_found(start));
        }

        let started = Instant::now();
        let mut episode = self.begin_episode();
        let mut state = SearchState::initial(start, query);
        let mut rewards: Vec<f64> = Vec::new();
        let mut experiences: Vec<Experience> = Vec::new();
        let mut stop = StopReason::Exhausted;

        for step in 0..self.walk.max_steps {
            if let Err(err) = control.check() {
                stop = StopReason::from_error(&err).unwrap_or(StopReason::Cancelled);
                warn!("TD walk for '{}' stopped at step {}: {}", query, step, err);
                break;
            }

            let chosen = match self.q_learning.best_action(&state) {
                Ok(chosen) => chosen,
                Err(err) if err.is_recoverable() => {
                    debug!("TD walk reached a dead end: {}", err);
                    stop = StopReason::DeadEnd;
                    break;
                }
                Err(err) => return Err(err),
            };

            let reward = self.scorer.score(&chosen.target, query);
            let next_state = state
                .execute(&chosen.action, chosen.target.kind, reward)
                .with_context("action_value", chosen.value);
            self.td_update(&mut episode, &state, &chosen.action, reward, &next_state)?;

            rewards.push(reward);
            experiences.push(Experience::new(
                state,
                chosen.action,
                reward,
                next_state.clone(),
            ));
            state = next_state;

            if reward > self.walk.high_confidence {
                stop = StopReason::StrongMatch;
                break;
            }
            let revisits = state.visit_count(&state.node_id).saturating_sub(1);
            if revisits > self.walk.max_revisits {
                stop = StopReason::Cycle;
                break;
            }
        }

        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.episodes += 1;
        }

        let path = state.visited;
        let total: f64 = rewards.iter().sum();
        let relevance = if path.is_empty() {
            0.0
        } else {
            total / path.len() as f64
        };
        let confidence = self.walk_confidence(&rewards, path.len());
        let explanation = explain_walk(&path, &rewards, stop);

        info!(
            "TD walk for '{}' from {}: {} steps, relevance {:.3}, confidence {:.3} ({})",
            query,
            start,
            path.len(),
            relevance,
            confidence,
            stop.as_str()
        );

        Ok(SearchResult {
            path,
            confidence,
            relevance,
            explanation,
            metadata: Default::default(),
            experiences,
        }
        .with_metadata("strategy", "td_lambda")
        .with_metadata("episode_id", Uuid::new_v4().to_string())
        .with_metadata("start_node", start)
        .with_metadata("steps", rewards.len())
        .with_metadata("stop_reason", stop.as_str())
        .with_metadata("mean_td_error", episode.mean_abs_td_error())
        .with_metadata("elapsed_ms", started.elapsed().as_millis() as u64))
    }

    /// Average step reward, nudged up for an improving trajectory and down
    /// for a long one
    fn walk_confidence(&self, rewards: &[f64], path_len: usize) -> f64 {
        if rewards.is_empty() {
            return 0.0;
        }
        let mut confidence = rewards.iter().sum::<f64>() / rewards.len() as f64;
        if let (Some(first), Some(last)) = (rewards.first(), rewards.last()) {
            if last > first {
                confidence += self.walk.trend_bonus;
            }
        }
        if path_len > self.walk.long_path {
            confidence -= self.walk.length_penalty;
        }
        confidence.clamp(0.0, 1.0)
    }

    /// Replay a user-confirmed path, rewarding earlier steps more
    ///
    /// `path[0]` is the node the replay starts from; transition `i` earns
    /// `satisfaction * (1 - 0.1 * i)`, floored at zero.
    pub fn learn_from_feedback(
        &self,
        query: &str,
        path: &[NodeId],
        satisfaction: f64,
    ) -> EngineResult<()> {
        if path.is_empty() {
            return Err(EngineError::invalid_feedback("selected path is empty"));
        }
        if path.len() < 2 {
            return Err(EngineError::invalid_feedback("path needs at least two nodes"));
        }
        if !(0.0..=1.0).contains(&satisfaction) {
            return Err(EngineError::invalid_feedback(format!(
                "satisfaction must be within [0, 1], got {}",
                satisfaction
            )));
        }
        require_terms(query)?;

        let mut episode = self.begin_episode();
        let mut state = SearchState::initial(path[0].clone(), query);

        for (i, pair) in path.windows(2).enumerate() {
            let target = &pair[1];
            let kind = self
                .q_learning
                .graph()
                .node(target)
                .map(|node| node.kind)
                .unwrap_or(NodeKind::Other);
            let reward = satisfaction * (1.0 - FEEDBACK_STEP_DISCOUNT * i as f64).max(0.0);
            let action = Action::move_to(target.clone());
            let next_state = state.execute(&action, kind, reward);
            self.td_update(&mut episode, &state, &action, reward, &next_state)?;
            state = next_state;
        }

        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.feedback_events += 1;
        }

        info!(
            "Applied feedback for '{}' over {} nodes (satisfaction {:.2}, mean |δ| {:.4})",
            query,
            path.len(),
            satisfaction,
            episode.mean_abs_td_error()
        );
        Ok(())
    }
}

fn explain_walk(path: &[NodeId], rewards: &[f64], stop: StopReason) -> String {
    let best = rewards
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &r)| match best {
            Some((_, b)) if r <= b => best,
            _ => Some((i, r)),
        });

    match best {
        Some((i, reward)) => format!(
            "TD(λ) walk visited {} nodes and stopped ({}); strongest match {} with relevance {:.3}",
            path.len(),
            stop.as_str(),
            path[i],
            reward
        ),
        None => format!(
            "TD(λ) walk found no move from the start node ({})",
            stop.as_str()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CodeNode, EdgeKind, GraphView, MemoryGraph};
    use crate::reinforcement::value_store::{MemoryValueStore, ValueStore};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn chain_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.add_node(CodeNode::new("A", "main.rs", NodeKind::File));
        graph.add_node(CodeNode::new("B", "run", NodeKind::Function));
        graph.add_node(
            CodeNode::new("C", "ParseConfig", NodeKind::Function)
                .public()
                .with_path("src/config.rs"),
        );
        graph.add_node(CodeNode::new("D", "write_output", NodeKind::Function));
        graph.add_edge("A", "B", EdgeKind::Contains).unwrap();
        graph.add_edge("B", "C", EdgeKind::Calls).unwrap();
        graph.add_edge("C", "D", EdgeKind::Calls).unwrap();
        graph
    }

    fn engine_with(
        graph: MemoryGraph,
        config: LearningConfig,
    ) -> (TdLearningEngine, Arc<MemoryValueStore>) {
        let store = Arc::new(MemoryValueStore::new());
        let core = QLearningCore::new(Arc::new(graph), store.clone());
        let engine = TdLearningEngine::new(
            core,
            RelevanceScorer::default(),
            config,
            WalkConfig::default(),
        )
        .unwrap();
        (engine, store)
    }

    fn engine() -> (TdLearningEngine, Arc<MemoryValueStore>) {
        engine_with(chain_graph(), LearningConfig::default())
    }

    fn unbounded() -> SearchControl {
        SearchControl::unbounded()
    }

    #[test]
    fn test_walk_reaches_exact_match() {
        let (engine, _) = engine();
        let result = engine
            .search_with_td_learning("parse config", "A", &unbounded())
            .unwrap();

        assert_eq!(result.path, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(result.metadata["stop_reason"], "strong_match");
        assert_eq!(result.experiences.len(), 2);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);

        let unrelated = engine
            .search_with_td_learning("unrelated xyz", "A", &unbounded())
            .unwrap();
        assert!(result.relevance > unrelated.relevance);
    }

    #[test]
    fn test_single_update_matches_formula() {
        let (engine, store) = engine();
        let mut episode = engine.begin_episode();
        let s = SearchState::initial("A", "parse config");
        let a = Action::move_to("B");
        let s2 = s.execute(&a, NodeKind::Function, 0.5);

        let delta = engine.td_update(&mut episode, &s, &a, 0.5, &s2).unwrap();
        assert!((delta - 0.5).abs() < 1e-12);

        let key = engine.q_learning().value_key(&s, &a);
        let value = store.get_value(&key).unwrap().unwrap();
        assert!((value - 0.1 * 0.5).abs() < 1e-12);
        // Trace was set to 1.0 then decayed once by γλ
        assert!((episode.traces().get(&key).unwrap() - 0.81).abs() < 1e-12);
    }

    #[test]
    fn test_trace_decay_law() {
        let config = LearningConfig {
            lambda: 0.8,
            discount_factor: 0.9,
            trace_threshold: 0.05,
            ..Default::default()
        };
        let (engine, _) = engine_with(chain_graph(), config);
        let mut episode = engine.begin_episode();

        let s0 = SearchState::initial("A", "q");
        let a0 = Action::move_to("B");
        let first_key = engine.q_learning().value_key(&s0, &a0);
        let mut state = s0.execute(&a0, NodeKind::Function, 0.0);
        engine.td_update(&mut episode, &s0, &a0, 0.0, &state).unwrap();

        let factor: f64 = 0.9 * 0.8;
        let mut n = 1;
        // Keep updating other pairs; the first pair is never touched again
        for target in ["C", "D", "C", "D", "C", "D", "C", "D", "C", "D"] {
            let expected = factor.powi(n);
            match episode.traces().get(&first_key) {
                Some(trace) => {
                    assert!(expected >= 0.05);
                    assert!((trace - expected).abs() < 1e-9, "n={} trace={}", n, trace);
                }
                None => assert!(expected < 0.05, "dropped too early at n={}", n),
            }

            let action = Action::move_to(target);
            let next = state.execute(&action, NodeKind::Function, 0.0);
            engine.td_update(&mut episode, &state, &action, 0.0, &next).unwrap();
            state = next;
            n += 1;
        }
        assert_eq!(episode.traces().get(&first_key), None);
    }

    #[test]
    fn test_trace_cap_is_never_exceeded() {
        let config = LearningConfig {
            max_traces: 3,
            lambda: 1.0,
            discount_factor: 1.0,
            ..Default::default()
        };
        let (engine, _) = engine_with(chain_graph(), config);
        let mut episode = engine.begin_episode();
        let mut state = SearchState::initial("A", "q");

        for i in 0..12 {
            let target = if i % 2 == 0 { "B" } else { "A" };
            let action = Action::move_to(target);
            let next = state.execute(&action, NodeKind::Function, 0.1);
            engine.td_update(&mut episode, &state, &action, 0.1, &next).unwrap();
            assert!(episode.traces().len() <= 3);
            assert!(engine.learning_stats().active_traces <= 3);
            state = next;
        }
        assert_eq!(episode.traces().len(), 3);
    }

    #[test]
    fn test_feedback_validation() {
        let (engine, store) = engine();
        let path = vec!["A".to_string(), "B".to_string()];

        for bad in [-0.1, 1.5, f64::NAN] {
            let err = engine.learn_from_feedback("q", &path, bad).unwrap_err();
            assert!(matches!(err, EngineError::InvalidFeedback { .. }));
        }
        let err = engine.learn_from_feedback("q", &[], 0.5).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFeedback { .. }));
        let err = engine
            .learn_from_feedback("q", &["A".to_string()], 0.5)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFeedback { .. }));
        assert!(err.to_string().contains("at least two nodes"));
        for query in ["", "!!!"] {
            let err = engine.learn_from_feedback(query, &path, 0.5).unwrap_err();
            assert!(matches!(err, EngineError::InvalidArgument { .. }));
        }
        assert!(store.is_empty().unwrap());
        assert_eq!(engine.learning_stats().feedback_events, 0);
    }

    #[test]
    fn test_feedback_replays_each_transition() {
        let (engine, store) = engine();
        let path: Vec<NodeId> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        engine.learn_from_feedback("parse config", &path, 1.0).unwrap();

        let encoder = engine.q_learning().encoder();
        let entry_for = |node: &str, depth: usize, target: &str| {
            let key = crate::reinforcement::state::ValueKey::new(
                encoder.encode_parts(node, "parse config", depth),
                Action::move_to(target).label,
            );
            store.entry(&key).unwrap().unwrap()
        };

        // Every row keeps the step that earned it, even after later
        // transitions rewrite its value through the trace
        for (depth, (node, target, reward)) in
            [("A", "B", 1.0), ("B", "C", 0.9), ("C", "D", 0.8)].into_iter().enumerate()
        {
            let entry = entry_for(node, depth, target);
            assert!((entry.last_reward - reward).abs() < 1e-12, "row {}", node);
            assert_eq!(entry.last_query, "parse config");
            let last_state: SearchState =
                serde_json::from_str(entry.last_state.as_deref().unwrap()).unwrap();
            assert_eq!(last_state.node_id, node);
            assert_eq!(last_state.depth, depth);
            assert_eq!(encoder.encode(&last_state), entry.key.state);
        }
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(engine.learning_stats().feedback_events, 1);
    }

    #[test]
    fn test_feedback_is_monotonic() {
        let (engine, store) = engine();
        let path: Vec<NodeId> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let keys: Vec<_> = {
            let encoder = engine.q_learning().encoder();
            vec![
                crate::reinforcement::state::ValueKey::new(
                    encoder.encode_parts("A", "q", 0),
                    Action::move_to("B").label,
                ),
                crate::reinforcement::state::ValueKey::new(
                    encoder.encode_parts("B", "q", 1),
                    Action::move_to("C").label,
                ),
            ]
        };

        let read = |keys: &[crate::reinforcement::state::ValueKey]| -> Vec<f64> {
            keys.iter()
                .map(|k| store.get_value(k).unwrap().unwrap_or(0.0))
                .collect()
        };

        let before = read(&keys);
        engine.learn_from_feedback("q", &path, 0.7).unwrap();
        let once = read(&keys);
        engine.learn_from_feedback("q", &path, 0.7).unwrap();
        let twice = read(&keys);

        for i in 0..keys.len() {
            let first_move = once[i] - before[i];
            let second_move = twice[i] - once[i];
            assert!(first_move > 0.0);
            assert!(second_move > 0.0, "value {} moved back", i);
        }
    }

    #[test]
    fn test_learning_progress_over_episodes() {
        let mut graph = MemoryGraph::new();
        graph.add_node(CodeNode::new("S", "lib.rs", NodeKind::File));
        graph.add_node(CodeNode::new("x1", "cli", NodeKind::Module));
        graph.add_node(CodeNode::new("x2", "commands", NodeKind::Module));
        graph.add_node(CodeNode::new("T", "ParseConfig", NodeKind::Function).public());
        graph.add_node(CodeNode::new("noise", "README.md", NodeKind::File));
        graph.add_edge("S", "x1", EdgeKind::Contains).unwrap();
        graph.add_edge("S", "noise", EdgeKind::Contains).unwrap();
        graph.add_edge("x1", "x2", EdgeKind::Contains).unwrap();
        graph.add_edge("x2", "T", EdgeKind::Contains).unwrap();
        let (engine, _) = engine_with(graph, LearningConfig::default());

        let mut end_relevance = Vec::new();
        let mut td_errors = Vec::new();
        for _ in 0..40 {
            let result = engine
                .search_with_td_learning("parse config", "S", &unbounded())
                .unwrap();
            let end = result.destination().unwrap().to_string();
            let node = engine.q_learning().graph().node(&end).unwrap();
            end_relevance.push(RelevanceScorer::default().score(&node, "parse config"));
            td_errors.push(result.metadata["mean_td_error"].as_f64().unwrap());
        }

        for pair in end_relevance.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
        }
        assert!((end_relevance.last().unwrap() - 0.9).abs() < 1e-9);
        assert!(td_errors.last().unwrap() < &(td_errors[0] * 0.5));
        assert!(engine.learning_stats().average_td_error < td_errors[0]);
        assert_eq!(engine.learning_stats().episodes, 40);
    }

    #[test]
    fn test_dead_end_returns_partial_path() {
        let mut graph = MemoryGraph::new();
        graph.add_node(CodeNode::new("alone", "alone", NodeKind::Function));
        let (engine, _) = engine_with(graph, LearningConfig::default());

        let result = engine
            .search_with_td_learning("anything", "alone", &unbounded())
            .unwrap();
        assert!(result.path.is_empty());
        assert_eq!(result.relevance, 0.0);
        assert_eq!(result.metadata["stop_reason"], "dead_end");
    }

    #[test]
    fn test_cycle_guard_stops_the_walk() {
        let (engine, _) = engine();
        let result = engine
            .search_with_td_learning("unrelated xyz", "A", &unbounded())
            .unwrap();
        assert!(result.path.len() <= 10);
        let last = result.destination().unwrap();
        let visits = result.path.iter().filter(|n| n.as_str() == last).count();
        assert!(visits <= 4);
    }

    #[test]
    fn test_cancelled_walk_returns_empty_result() {
        let (engine, _) = engine();
        let token = CancellationToken::new();
        token.cancel();
        let control = SearchControl::unbounded().with_cancellation(token);

        let result = engine
            .search_with_td_learning("parse config", "A", &control)
            .unwrap();
        assert!(result.path.is_empty());
        assert_eq!(result.metadata["stop_reason"], "cancelled");
    }

    #[test]
    fn test_unknown_start_and_empty_query_are_rejected() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.search_with_td_learning("q", "nope", &unbounded()),
            Err(EngineError::NodeNotFound { .. })
        ));
        for query in ["   ", "!!!", "?? --"] {
            assert!(matches!(
                engine.search_with_td_learning(query, "A", &unbounded()),
                Err(EngineError::InvalidArgument { .. })
            ));
        }
        assert_eq!(engine.learning_stats().episodes, 0);
    }

    #[test]
    fn test_non_ascii_queries_learn_separately() {
        let mut graph = MemoryGraph::new();
        graph.add_node(CodeNode::new("S", "lib.rs", NodeKind::File));
        graph.add_node(
            CodeNode::new("J", "解析設定", NodeKind::Function)
                .public()
                .with_purpose("解析設定"),
        );
        graph.add_edge("S", "J", EdgeKind::Contains).unwrap();
        let (engine, store) = engine_with(graph, LearningConfig::default());

        let result = engine
            .search_with_td_learning("解析設定", "S", &unbounded())
            .unwrap();
        assert_eq!(result.destination(), Some("J"));
        assert_eq!(result.metadata["stop_reason"], "strong_match");
        let learned = store.len().unwrap();

        // A different script gets its own rows instead of sharing the ones above
        engine
            .search_with_td_learning("конфигурация", "S", &unbounded())
            .unwrap();
        assert!(store.len().unwrap() > learned);
    }

    #[test]
    fn test_config_hot_reload() {
        let (engine, _) = engine();
        let mut config = engine.learning_config();
        config.lambda = 0.5;
        engine.update_learning_config(config.clone()).unwrap();
        assert_eq!(engine.learning_config().lambda, 0.5);
        assert_eq!(engine.begin_episode().config().lambda, 0.5);

        config.learning_rate = 2.0;
        assert!(engine.update_learning_config(config).is_err());
        assert_eq!(engine.learning_config().learning_rate, 0.1);
    }
}

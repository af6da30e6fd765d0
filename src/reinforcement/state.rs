// Search state representation for reinforcement learning
// Captures where a walk is in the graph and what it is looking for

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, EngineResult};
use crate::graph::{NodeId, NodeKind};
use crate::reinforcement::action::Action;

// Camel-case words, acronyms, caseless scripts (CJK and the like) and digit runs
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\p{Lu}?[\p{Ll}\p{M}]+|\p{Lu}+|[\p{Lo}\p{M}]+|\p{N}+")
        .expect("valid token pattern")
});

/// Split identifiers and free text into lowercase terms
///
/// `ParseConfig`, `parse_config` and `parse-config` all yield `["parse", "config"]`.
/// Letters of any script count, so `café` stays one term and `解析設定` is one term.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Terms joined by single spaces, used for whole-phrase matching
pub fn normalize_phrase(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Reject queries that would normalize to nothing and share one state key
pub fn require_terms(query: &str) -> EngineResult<Vec<String>> {
    let terms = tokenize(query);
    if terms.is_empty() {
        return Err(EngineError::invalid_argument(format!(
            "query '{}' has no searchable terms",
            query
        )));
    }
    Ok(terms)
}

/// One step of a search through the graph
///
/// States are produced fresh at every step; `execute` returns a new state
/// rather than mutating the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    /// Node the walk currently stands on
    pub node_id: NodeId,
    /// Query text as supplied by the caller
    pub query: String,
    /// Tokenized query terms
    pub query_terms: Vec<String>,
    /// Nodes entered so far, in order (the start node is not included)
    pub visited: Vec<NodeId>,
    /// How many visited nodes of each kind the walk has seen
    pub type_counts: BTreeMap<NodeKind, usize>,
    pub depth: usize,
    /// Reward earned by the step that produced this state
    pub last_relevance: f64,
    pub last_action: Option<String>,
    /// Free-form numeric context (diagnostics only, never part of the key)
    pub context: BTreeMap<String, f64>,
}

impl SearchState {
    /// Create the initial state of a search
    pub fn initial(node_id: impl Into<NodeId>, query: &str) -> Self {
        Self {
            node_id: node_id.into(),
            query: query.to_string(),
            query_terms: tokenize(query),
            visited: Vec::new(),
            type_counts: BTreeMap::new(),
            depth: 0,
            last_relevance: 0.0,
            last_action: None,
            context: BTreeMap::new(),
        }
    }

    /// State reached by taking `action` into a node of `kind`
    pub fn execute(&self, action: &Action, kind: NodeKind, relevance: f64) -> SearchState {
        let mut next = self.clone();
        next.node_id = action.target.clone();
        next.visited.push(action.target.clone());
        *next.type_counts.entry(kind).or_insert(0) += 1;
        next.depth += 1;
        next.last_relevance = relevance;
        next.last_action = Some(action.label.clone());
        next
    }

    /// Same state with one context value replaced
    pub fn with_context(mut self, name: impl Into<String>, value: f64) -> Self {
        self.context.insert(name.into(), value);
        self
    }

    /// How many times `node_id` appears in the visited history
    pub fn visit_count(&self, node_id: &str) -> usize {
        self.visited.iter().filter(|v| v.as_str() == node_id).count()
    }
}

/// Stable identifier of a search state in the value store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey(String);

impl StateKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-encoded key, e.g. one read back from storage
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite (state, action) key for values and eligibility traces
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueKey {
    pub state: StateKey,
    pub action: String,
}

impl ValueKey {
    pub fn new(state: StateKey, action: impl Into<String>) -> Self {
        Self {
            state,
            action: action.into(),
        }
    }
}

/// Reduces a search state to a `StateKey`
///
/// Only the current node, the normalized query and the depth are hashed.
/// Visited history and auxiliary context are left out so that different
/// trajectories reaching the same node at the same depth share values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateEncoder;

impl StateEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, state: &SearchState) -> StateKey {
        self.encode_parts(&state.node_id, &state.query, state.depth)
    }

    pub fn encode_parts(&self, node_id: &str, query: &str, depth: usize) -> StateKey {
        let mut hasher = Sha256::new();
        hasher.update(node_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(normalize_phrase(query).as_bytes());
        hasher.update([0u8]);
        hasher.update((depth as u64).to_le_bytes());
        StateKey(format!("{:x}", hasher.finalize()))
    }
}

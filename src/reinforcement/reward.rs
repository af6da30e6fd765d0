// Reward signal for the search agent
// Scores how well a graph node answers a query; both search strategies use it

use serde::{Deserialize, Serialize};

use crate::graph::CodeNode;
use crate::reinforcement::state::{normalize_phrase, tokenize};

/// Weights of the individual relevance signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Whole query found in the node name
    pub name_phrase: f64,
    /// Per query term found in the node name
    pub name_term: f64,
    /// Per query term found in the node path
    pub path_term: f64,
    /// Whole query found in the purpose text
    pub purpose_phrase: f64,
    /// Per query term found in the purpose text
    pub purpose_term: f64,
    /// Per query term found in the documentation
    pub documentation_term: f64,
    /// Bonus for exported/public nodes
    pub exported_bonus: f64,
    /// Bonus for functions, structs and interfaces
    pub high_value_bonus: f64,
    /// Upper bound of the total score
    pub ceiling: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name_phrase: 0.5,
            name_term: 0.15,
            path_term: 0.05,
            purpose_phrase: 0.2,
            purpose_term: 0.05,
            documentation_term: 0.03,
            exported_bonus: 0.05,
            high_value_bonus: 0.05,
            ceiling: 1.0,
        }
    }
}

/// Deterministic lexical/structural relevance of a node to a query
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score `node` against `query`, in `[0, ceiling]`
    pub fn score(&self, node: &CodeNode, query: &str) -> f64 {
        let w = &self.weights;
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();
        let phrase = normalize_phrase(query);

        let name_terms = tokenize(&node.name);
        let path_terms = tokenize(&node.path);
        let purpose_terms = tokenize(&node.purpose);
        let doc_terms = tokenize(&node.documentation);

        let mut score = 0.0;

        if !phrase.is_empty() {
            if contains_phrase(&name_terms, &phrase) {
                score += w.name_phrase;
            }
            if contains_phrase(&purpose_terms, &phrase) {
                score += w.purpose_phrase;
            }
        }

        for term in &terms {
            if name_terms.contains(term) {
                score += w.name_term;
            }
            if path_terms.contains(term) {
                score += w.path_term;
            }
            if purpose_terms.contains(term) {
                score += w.purpose_term;
            }
            if doc_terms.contains(term) {
                score += w.documentation_term;
            }
        }

        if node.is_exported() {
            score += w.exported_bonus;
        }
        if node.kind.is_high_value() {
            score += w.high_value_bonus;
        }

        score.clamp(0.0, w.ceiling)
    }
}

/// Whether the space-joined `terms` contain `phrase` on term boundaries
fn contains_phrase(terms: &[String], phrase: &str) -> bool {
    if terms.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", terms.join(" "));
    haystack.contains(&format!(" {} ", phrase))
}

// Arena-allocated search tree for MCTS
// Nodes refer to each other by index; the root is always index 0

use crate::graph::CodeNode;
use crate::reinforcement::{action::Action, state::SearchState};

/// Index of a node inside a `SearchTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SearchTreeNode {
    pub state: SearchState,
    pub parent: Option<NodeHandle>,
    /// Move that led here from the parent
    pub action: Option<Action>,
    pub children: Vec<NodeHandle>,
    /// Moves not expanded yet
    pub untried: Vec<(Action, CodeNode)>,
    pub visits: u64,
    pub total_value: f64,
    /// Evaluations run at this node itself
    pub simulations: u64,
    /// Relevance of the graph node this tree node stands on
    pub relevance: f64,
    pub terminal: bool,
}

impl SearchTreeNode {
    pub fn new(
        state: SearchState,
        untried: Vec<(Action, CodeNode)>,
        relevance: f64,
        terminal: bool,
    ) -> Self {
        Self {
            state,
            parent: None,
            action: None,
            children: Vec::new(),
            untried,
            visits: 0,
            total_value: 0.0,
            simulations: 0,
            relevance,
            terminal,
        }
    }

    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_value / self.visits as f64
        }
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.untried.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<SearchTreeNode>,
}

impl SearchTree {
    pub fn new(root: SearchTreeNode) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    pub fn get(&self, handle: NodeHandle) -> &SearchTreeNode {
        &self.nodes[handle.0]
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> &mut SearchTreeNode {
        &mut self.nodes[handle.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> {
        (0..self.nodes.len()).map(NodeHandle)
    }

    pub fn add_child(
        &mut self,
        parent: NodeHandle,
        action: Action,
        mut child: SearchTreeNode,
    ) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len());
        child.parent = Some(parent);
        child.action = Some(action);
        self.nodes.push(child);
        self.nodes[parent.0].children.push(handle);
        handle
    }

    /// UCB1 score of a child; unvisited children score +∞
    pub fn ucb1(&self, child: NodeHandle, exploration: f64) -> f64 {
        let node = self.get(child);
        if node.visits == 0 {
            return f64::INFINITY;
        }
        let parent_visits = node
            .parent
            .map(|p| self.get(p).visits)
            .unwrap_or(node.visits)
            .max(1) as f64;
        node.mean_value() + exploration * (parent_visits.ln() / node.visits as f64).sqrt()
    }

    /// Child with the highest UCB1 score; the earliest child wins ties
    pub fn select_child(&self, parent: NodeHandle, exploration: f64) -> Option<NodeHandle> {
        let mut best: Option<(NodeHandle, f64)> = None;
        for &child in &self.get(parent).children {
            let score = self.ucb1(child, exploration);
            match best {
                Some((_, current)) if score <= current => {}
                _ => best = Some((child, score)),
            }
        }
        best.map(|(handle, _)| handle)
    }

    /// Add one visit and `value` to `leaf` and every ancestor
    pub fn backpropagate(&mut self, leaf: NodeHandle, value: f64) {
        self.nodes[leaf.0].simulations += 1;
        let mut current = Some(leaf);
        while let Some(handle) = current {
            let node = &mut self.nodes[handle.0];
            node.visits += 1;
            node.total_value += value;
            current = node.parent;
        }
    }

    /// Greedy walk from the root by mean value, at most `max_hops` edges
    pub fn best_path(&self, max_hops: usize) -> Vec<NodeHandle> {
        let mut path = vec![self.root()];
        let mut current = self.root();

        while path.len() <= max_hops {
            let mut best: Option<(NodeHandle, f64)> = None;
            for &child in &self.get(current).children {
                let node = self.get(child);
                if node.visits == 0 {
                    continue;
                }
                let value = node.mean_value();
                match best {
                    Some((_, current_best)) if value <= current_best => {}
                    _ => best = Some((child, value)),
                }
            }
            match best {
                Some((child, _)) => {
                    path.push(child);
                    current = child;
                }
                None => break,
            }
        }
        path
    }
}

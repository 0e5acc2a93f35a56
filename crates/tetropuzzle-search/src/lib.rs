//! Generic iterative-deepening A* (IDA*) search.
//!
//! The search works on any graph that implements [`SearchNode`]. Nodes are
//! identified by [`SearchNode::Id`]; the goal is reached when a node's id equals
//! the goal id. Edge costs and heuristic values are non-negative integers.
//!
//! # Example
//!
//! ```
//! use tetropuzzle_search::{Edge, IdaStar, SearchNode, SearchOutcome};
//!
//! #[derive(Clone)]
//! struct Counter(u32);
//!
//! impl SearchNode for Counter {
//!     type Id = u32;
//!     type Action = &'static str;
//!
//!     fn id(&self) -> u32 {
//!         self.0
//!     }
//!
//!     fn edges(&self) -> Vec<Edge<Self>> {
//!         vec![
//!             Edge { to: Counter(self.0 + 1), cost: 1, action: "inc" },
//!             Edge { to: Counter(self.0 * 2), cost: 1, action: "double" },
//!         ]
//!     }
//! }
//!
//! let outcome = IdaStar::new().with_max_depth(10).search(&Counter(1), &6);
//! assert_eq!(
//!     outcome,
//!     SearchOutcome::Found { actions: vec!["inc", "inc", "double"], cost: 3 }
//! );
//! ```

use std::{
    collections::HashMap,
    hash::Hash,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
};

/// A node of a search graph.
pub trait SearchNode: Clone {
    /// Identity of the node; two nodes with the same id are the same state.
    type Id: Clone + Eq + Hash;
    /// Payload of an edge, returned as the solution path.
    type Action: Clone;

    fn id(&self) -> Self::Id;

    /// Outgoing edges. Called at most once per node id within one search.
    fn edges(&self) -> Vec<Edge<Self>>;
}

/// A directed edge to `to`, produced by performing `action` at `cost`.
#[derive(Debug, Clone)]
pub struct Edge<N: SearchNode> {
    pub to: N,
    pub cost: u32,
    pub action: N::Action,
}

/// Estimates the remaining cost from a node to the goal.
///
/// The estimate must never exceed the true remaining cost for the search to
/// return optimal paths.
pub trait Heuristic<N: SearchNode> {
    fn estimate(&self, node: &N, goal: &N::Id) -> u32;
}

impl<N, F> Heuristic<N> for F
where
    N: SearchNode,
    F: Fn(&N, &N::Id) -> u32,
{
    fn estimate(&self, node: &N, goal: &N::Id) -> u32 {
        self(node, goal)
    }
}

/// The heuristic that always returns zero, turning the search into iterative
/// deepening on path cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroHeuristic;

impl<N: SearchNode> Heuristic<N> for ZeroHeuristic {
    fn estimate(&self, _node: &N, _goal: &N::Id) -> u32 {
        0
    }
}

/// Result of [`IdaStar::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<A> {
    /// A cheapest path to the goal.
    Found { actions: Vec<A>, cost: u32 },
    /// No path exists, or every path costs more than the maximum depth.
    NotFound,
    /// The cancel flag was raised before a path was found.
    Cancelled,
}

impl<A> SearchOutcome<A> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Cost of the path, if one was found.
    #[must_use]
    pub fn cost(&self) -> Option<u32> {
        match self {
            Self::Found { cost, .. } => Some(*cost),
            Self::NotFound | Self::Cancelled => None,
        }
    }
}

/// Iterative-deepening A* search configuration.
#[derive(Debug, Clone)]
pub struct IdaStar<'a, H = ZeroHeuristic> {
    heuristic: H,
    max_depth: Option<u32>,
    cancel: Option<&'a AtomicBool>,
}

impl Default for IdaStar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl IdaStar<'_> {
    /// Creates a search with the zero heuristic, no depth limit and no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heuristic: ZeroHeuristic,
            max_depth: None,
            cancel: None,
        }
    }
}

impl<'a, H> IdaStar<'a, H> {
    #[must_use]
    pub fn with_heuristic<H2>(self, heuristic: H2) -> IdaStar<'a, H2> {
        IdaStar {
            heuristic,
            max_depth: self.max_depth,
            cancel: self.cancel,
        }
    }

    /// Gives up once the cost bound exceeds `max_depth`.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Stops with [`SearchOutcome::Cancelled`] once `cancel` is set.
    ///
    /// The flag is checked each time the cost bound is raised.
    #[must_use]
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Searches a cheapest path from `start` to the node with id `goal`.
    pub fn search<N>(&self, start: &N, goal: &N::Id) -> SearchOutcome<N::Action>
    where
        N: SearchNode,
        H: Heuristic<N>,
    {
        let mut run = Run {
            heuristic: &self.heuristic,
            goal,
            edges: HashMap::new(),
            path: vec![start.id()],
            actions: Vec::new(),
        };
        let mut bound = self.heuristic.estimate(start, goal);
        loop {
            if self.max_depth.is_some_and(|max| bound > max) {
                tracing::trace!(bound, "bound exceeds maximum depth");
                return SearchOutcome::NotFound;
            }
            match run.visit(start, 0, bound) {
                Visit::Found(cost) => {
                    return SearchOutcome::Found {
                        actions: run.actions,
                        cost,
                    };
                }
                Visit::Exceeded(next_bound) => {
                    tracing::trace!(bound, next_bound, expanded = run.edges.len(), "raising bound");
                    bound = next_bound;
                }
                Visit::Exhausted => return SearchOutcome::NotFound,
            }
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::trace!(bound, "search cancelled");
                return SearchOutcome::Cancelled;
            }
        }
    }
}

enum Visit {
    Found(u32),
    /// Smallest f-value above the bound seen in this iteration.
    Exceeded(u32),
    Exhausted,
}

/// State of one [`IdaStar::search`] invocation.
struct Run<'s, N: SearchNode, H> {
    heuristic: &'s H,
    goal: &'s N::Id,
    edges: HashMap<N::Id, Rc<[Edge<N>]>>,
    path: Vec<N::Id>,
    actions: Vec<N::Action>,
}

impl<N, H> Run<'_, N, H>
where
    N: SearchNode,
    H: Heuristic<N>,
{
    fn visit(&mut self, node: &N, cost: u32, bound: u32) -> Visit {
        let f = cost.saturating_add(self.heuristic.estimate(node, self.goal));
        if f > bound {
            return Visit::Exceeded(f);
        }
        let id = node.id();
        if id == *self.goal {
            return Visit::Found(cost);
        }

        let edges = Rc::clone(
            self.edges
                .entry(id)
                .or_insert_with(|| node.edges().into()),
        );
        let mut next_bound = None;
        for edge in edges.iter() {
            let to = edge.to.id();
            if self.path.contains(&to) {
                continue;
            }
            self.path.push(to);
            self.actions.push(edge.action.clone());
            match self.visit(&edge.to, cost.saturating_add(edge.cost), bound) {
                Visit::Found(total) => return Visit::Found(total),
                Visit::Exceeded(f) => {
                    next_bound = Some(next_bound.map_or(f, |b: u32| b.min(f)));
                }
                Visit::Exhausted => {}
            }
            self.path.pop();
            self.actions.pop();
        }
        next_bound.map_or(Visit::Exhausted, Visit::Exceeded)
    }
}

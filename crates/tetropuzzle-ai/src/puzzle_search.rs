//! Puzzle solving as an IDA* search over puzzle images.
//!
//! A node is the puzzle image plus the pieces the player still owns on that path;
//! both are part of its identity.
//! An edge places one piece, bundled with whatever actions are needed to get the
//! piece first: nothing if it is owned, otherwise taking an `O1` and/or exchanging
//! pieces with the reserve. Edge cost is the number of actions in the bundle.

use std::sync::atomic::AtomicBool;

use tetropuzzle_engine::{
    Action, BinaryImage, GRID_CELLS, Placement, PuzzleId, ShapeCounts, TetrominoShape,
};
use tetropuzzle_search::{Edge, IdaStar, SearchNode, SearchOutcome};

use crate::upgrade_path::UpgradeTable;

/// How to get hold of one piece of a shape.
#[derive(Debug, Clone)]
struct Acquisition {
    actions: Vec<Action>,
    /// Owned shape consumed by the acquisition, if any.
    consumes: Option<TetrominoShape>,
}

/// Solves puzzles for one player against a fixed reserve.
#[derive(Debug, Clone)]
pub struct PuzzleSolver<'a> {
    reserve: ShapeCounts,
    owned_only: bool,
    upgrades: UpgradeTable,
    max_depth: Option<u32>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> PuzzleSolver<'a> {
    #[must_use]
    pub fn new(reserve: ShapeCounts) -> Self {
        Self {
            upgrades: UpgradeTable::new(&reserve),
            reserve,
            owned_only: false,
            max_depth: None,
            cancel: None,
        }
    }

    /// Restricts the search to pieces the player already owns, as during
    /// finishing touches.
    #[must_use]
    pub fn owned_only(mut self, owned_only: bool) -> Self {
        self.owned_only = owned_only;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<u32>) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Finds the shortest action sequence that completes the puzzle `puzzle_id`
    /// with the current `image`, starting from the `owned` pieces.
    pub fn solve(
        &self,
        puzzle_id: PuzzleId,
        image: BinaryImage,
        owned: &ShapeCounts,
    ) -> SearchOutcome<Action> {
        let context = Context {
            solver: self,
            puzzle_id,
        };
        let start = PuzzleNode {
            image,
            owned: *owned,
            context: &context,
        };
        let mut search = IdaStar::new().with_heuristic(remaining_steps);
        if let Some(max_depth) = self.max_depth {
            search = search.with_max_depth(max_depth);
        }
        if let Some(cancel) = self.cancel {
            search = search.with_cancel(cancel);
        }
        match search.search(&start, &GOAL) {
            SearchOutcome::Found { actions, cost } => SearchOutcome::Found {
                actions: actions.into_iter().flatten().collect(),
                cost,
            },
            SearchOutcome::NotFound => SearchOutcome::NotFound,
            SearchOutcome::Cancelled => SearchOutcome::Cancelled,
        }
    }

    fn acquisition(&self, shape: TetrominoShape, owned: &ShapeCounts) -> Option<Acquisition> {
        if owned[shape] > 0 {
            return Some(Acquisition {
                actions: Vec::new(),
                consumes: Some(shape),
            });
        }
        if self.owned_only {
            return None;
        }

        let from_owned = owned
            .available()
            .filter_map(|from| Some((from, self.upgrades.get(from, shape)?)))
            .min_by_key(|(_, path)| path.len())
            .map(|(from, path)| Acquisition {
                actions: path.to_vec(),
                consumes: Some(from),
            });
        let from_basic = (self.reserve[TetrominoShape::BASIC] > 0)
            .then(|| self.upgrades.get(TetrominoShape::BASIC, shape))
            .flatten()
            .map(|path| Acquisition {
                actions: [Action::TakeBasicTetromino]
                    .into_iter()
                    .chain(path.iter().cloned())
                    .collect(),
                consumes: None,
            });
        [from_owned, from_basic]
            .into_iter()
            .flatten()
            .min_by_key(|acquisition| acquisition.actions.len())
    }
}

/// Lower bound on the actions left: every placement is one action and covers at
/// most four cells.
fn remaining_steps(node: &PuzzleNode<'_>, _goal: &(BinaryImage, ShapeCounts)) -> u32 {
    node.image.count_empty().div_ceil(4)
}

#[derive(Debug)]
struct Context<'s> {
    solver: &'s PuzzleSolver<'s>,
    puzzle_id: PuzzleId,
}

#[derive(Debug, Clone)]
struct PuzzleNode<'c> {
    image: BinaryImage,
    owned: ShapeCounts,
    context: &'c Context<'c>,
}

/// Every completed puzzle is the same goal, whatever pieces are left over.
const GOAL: (BinaryImage, ShapeCounts) = (BinaryImage::FULL, ShapeCounts::ZERO);

impl SearchNode for PuzzleNode<'_> {
    type Id = (BinaryImage, ShapeCounts);
    type Action = Vec<Action>;

    fn id(&self) -> (BinaryImage, ShapeCounts) {
        if self.image.is_full() {
            GOAL
        } else {
            (self.image, self.owned)
        }
    }

    fn edges(&self) -> Vec<Edge<Self>> {
        // Every completion covers the first empty cell with some piece, so only
        // placements covering it need to be tried.
        let first_empty = (!self.image).bits().trailing_zeros();
        if first_empty as usize >= GRID_CELLS {
            return Vec::new();
        }
        let target = 1 << first_empty;

        let mut edges = Vec::new();
        for shape in TetrominoShape::ALL {
            let Some(acquisition) = self.context.solver.acquisition(shape, &self.owned) else {
                continue;
            };
            let mut owned = self.owned;
            if let Some(consumed) = acquisition.consumes {
                owned[consumed] -= 1;
            }
            for &position in shape.all_placements() {
                if position.bits() & target == 0 || self.image.overlaps(position) {
                    continue;
                }
                let mut actions = acquisition.actions.clone();
                actions.push(Action::PlaceTetromino(Placement {
                    puzzle_id: self.context.puzzle_id,
                    shape,
                    position,
                }));
                edges.push(Edge {
                    to: PuzzleNode {
                        image: self.image | position,
                        owned,
                        context: self.context,
                    },
                    cost: u32::try_from(actions.len()).unwrap_or(u32::MAX),
                    action: actions,
                });
            }
        }
        edges
    }
}

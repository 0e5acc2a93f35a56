use tetropuzzle_engine::{Action, ShapeCounts, TetrominoShape};
use tetropuzzle_search::{Edge, IdaStar, SearchNode, SearchOutcome};

/// A shape in hand while exchanging pieces with the reserve.
#[derive(Debug, Clone, Copy)]
struct UpgradeNode<'a> {
    shape: TetrominoShape,
    reserve: &'a ShapeCounts,
}

impl SearchNode for UpgradeNode<'_> {
    type Id = TetrominoShape;
    type Action = Action;

    fn id(&self) -> TetrominoShape {
        self.shape
    }

    fn edges(&self) -> Vec<Edge<Self>> {
        self.shape
            .change_options(self.reserve)
            .into_iter()
            .map(|new| Edge {
                to: UpgradeNode {
                    shape: new,
                    reserve: self.reserve,
                },
                cost: 1,
                action: Action::ChangeTetromino {
                    old: self.shape,
                    new,
                },
            })
            .collect()
    }
}

/// Shortest sequence of [`Action::ChangeTetromino`] turning `from` into `to`.
///
/// The reserve is taken as fixed while searching. Returns an empty sequence when
/// `from == to` and `None` when `to` cannot be reached.
#[must_use]
pub fn upgrade_path(
    from: TetrominoShape,
    to: TetrominoShape,
    reserve: &ShapeCounts,
) -> Option<Vec<Action>> {
    let start = UpgradeNode { shape: from, reserve };
    match IdaStar::new().search(&start, &to) {
        SearchOutcome::Found { actions, .. } => Some(actions),
        SearchOutcome::NotFound | SearchOutcome::Cancelled => None,
    }
}

/// Shortest upgrade paths between every pair of shapes for one reserve.
#[derive(Debug, Clone)]
pub struct UpgradeTable {
    paths: Vec<Option<Vec<Action>>>,
}

impl UpgradeTable {
    #[must_use]
    pub fn new(reserve: &ShapeCounts) -> Self {
        let paths = TetrominoShape::ALL
            .into_iter()
            .flat_map(|from| {
                TetrominoShape::ALL
                    .into_iter()
                    .map(move |to| upgrade_path(from, to, reserve))
            })
            .collect();
        Self { paths }
    }

    #[must_use]
    pub fn get(&self, from: TetrominoShape, to: TetrominoShape) -> Option<&[Action]> {
        self.paths[from.index() * TetrominoShape::LEN + to.index()].as_deref()
    }
}

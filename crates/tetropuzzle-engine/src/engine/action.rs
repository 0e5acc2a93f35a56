use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{BinaryImage, PuzzleColor, PuzzleId, TetrominoShape};

/// A tetromino placed at a position in one of the player's puzzles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Placement {
    pub puzzle_id: PuzzleId,
    pub shape: TetrominoShape,
    pub position: BinaryImage,
}

/// Where a puzzle is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum PuzzleSource {
    /// The face-down top puzzle of a deck.
    TopOfDeck(PuzzleColor),
    /// A face-up puzzle in one of the rows.
    Row(PuzzleId),
}

/// Everything a player can do on their turn.
///
/// Actions are plain values: they are checked by
/// [`ActionVerifier`](crate::ActionVerifier) and applied by
/// [`ActionProcessor`](crate::ActionProcessor).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Action {
    /// Passes one action slot.
    DoNothing,
    /// Takes an `O1` from the reserve.
    TakeBasicTetromino,
    /// Exchanges an owned tetromino for another one from the reserve.
    ChangeTetromino {
        old: TetrominoShape,
        new: TetrominoShape,
    },
    /// Places an owned tetromino into a puzzle in progress.
    PlaceTetromino(Placement),
    /// Takes a puzzle into a free puzzle slot.
    TakePuzzle(PuzzleSource),
    /// Returns a whole row to the bottom of its deck in the given order.
    Recycle {
        color: PuzzleColor,
        order: Vec<PuzzleId>,
    },
    /// Places one tetromino into each of several distinct puzzles for a single slot.
    MasterAction(Vec<Placement>),
    /// Ends the current player's finishing touches.
    EndFinishingTouches,
}

/// The kind of an [`Action`], without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
pub enum ActionKind {
    DoNothing,
    TakeBasicTetromino,
    ChangeTetromino,
    PlaceTetromino,
    TakePuzzle,
    Recycle,
    MasterAction,
    EndFinishingTouches,
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::DoNothing => ActionKind::DoNothing,
            Action::TakeBasicTetromino => ActionKind::TakeBasicTetromino,
            Action::ChangeTetromino { .. } => ActionKind::ChangeTetromino,
            Action::PlaceTetromino(_) => ActionKind::PlaceTetromino,
            Action::TakePuzzle(_) => ActionKind::TakePuzzle,
            Action::Recycle { .. } => ActionKind::Recycle,
            Action::MasterAction(_) => ActionKind::MasterAction,
            Action::EndFinishingTouches => ActionKind::EndFinishingTouches,
        }
    }

    /// Checks if the action uses up one of the player's action slots.
    #[must_use]
    pub fn consumes_slot(&self) -> bool {
        !matches!(self, Action::EndFinishingTouches)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DoNothing => write!(f, "do nothing"),
            Action::TakeBasicTetromino => write!(f, "take basic tetromino"),
            Action::ChangeTetromino { old, new } => write!(f, "change {old} to {new}"),
            Action::PlaceTetromino(placement) => write!(
                f,
                "place {} into puzzle {} at {:#09x}",
                placement.shape,
                placement.puzzle_id,
                placement.position.bits()
            ),
            Action::TakePuzzle(PuzzleSource::TopOfDeck(color)) => {
                write!(f, "take top puzzle of {color} deck")
            }
            Action::TakePuzzle(PuzzleSource::Row(id)) => write!(f, "take puzzle {id}"),
            Action::Recycle { color, .. } => write!(f, "recycle {color} row"),
            Action::MasterAction(placements) => {
                write!(f, "master action with {} placements", placements.len())
            }
            Action::EndFinishingTouches => write!(f, "end finishing touches"),
        }
    }
}

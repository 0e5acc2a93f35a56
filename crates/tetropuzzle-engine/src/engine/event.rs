use serde::Serialize;

use crate::core::{BinaryImage, PuzzleColor, PuzzleId, ShapeCounts, TetrominoShape};

use super::{player_state::PlayerId, turn::GamePhase};

/// A state change reported to observers after an action was processed.
///
/// Events carry just enough data for presentation; the authoritative state is
/// always available through [`Game::snapshot`](crate::Game::snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GameEvent {
    /// The face-up puzzles of a row changed.
    RowChanged {
        color: PuzzleColor,
        puzzles: Vec<PuzzleId>,
    },
    /// The number of puzzles in a deck changed.
    DeckChanged { color: PuzzleColor, len: usize },
    /// The shared tetromino reserve changed.
    ReserveChanged { reserve: ShapeCounts },
    /// A player's tetromino inventory changed.
    InventoryChanged {
        player: PlayerId,
        tetrominoes: ShapeCounts,
    },
    /// A puzzle moved into one of a player's puzzle slots.
    PuzzleAdded {
        player: PlayerId,
        puzzle_id: PuzzleId,
    },
    /// A player completed a puzzle.
    PuzzleFinished {
        player: PlayerId,
        puzzle_id: PuzzleId,
    },
    /// A tetromino was placed into a puzzle.
    TetrominoPlaced {
        player: PlayerId,
        puzzle_id: PuzzleId,
        shape: TetrominoShape,
        position: BinaryImage,
    },
    /// A player's score changed.
    ScoreChanged { player: PlayerId, score: i32 },
    /// The game moved to a new phase.
    PhaseChanged { phase: GamePhase },
    /// It is now another player's turn.
    TurnChanged { player: PlayerId },
}

/// Receives [`GameEvent`]s in the order they happened.
pub trait GameObserver {
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> GameObserver for F
where
    F: FnMut(&GameEvent),
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event);
    }
}

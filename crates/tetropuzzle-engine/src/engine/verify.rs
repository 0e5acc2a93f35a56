//! Action verification: checks an action against the rules without mutating state.
//!
//! Every rule violation is reported as a [`VerificationFailure`] value. The first
//! failing rule wins, so the order of the checks below is part of the contract.

use crate::core::{BinaryImage, PuzzleColor, PuzzleId, ShapeCounts, TetrominoShape};

use super::{
    action::{Action, ActionKind, Placement, PuzzleSource},
    player_state::PlayerState,
    shared_state::SharedState,
    turn::{GamePhase, TurnInfo},
};

/// Why an action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum VerificationFailure {
    #[display("the game has already ended")]
    GameEnded,
    #[display("{kind} is not allowed during finishing touches")]
    NotAllowedInFinishingTouches { kind: ActionKind },
    #[display("finishing touches can only be ended during the finishing touches phase")]
    NotInFinishingTouches,
    #[display("a reward must be chosen before the next action")]
    RewardChoicePending,
    #[display("the reserve has no {shape} left")]
    ReserveEmpty { shape: TetrominoShape },
    #[display("player owns {owned} {shape} but needs {needed}")]
    TetrominoNotOwned {
        shape: TetrominoShape,
        owned: u32,
        needed: u32,
    },
    #[display("{old} cannot be changed to {new}")]
    ChangeNotAllowed {
        old: TetrominoShape,
        new: TetrominoShape,
    },
    #[display("position {:#09x} is not a {shape}", position.bits())]
    ShapeMismatch {
        shape: TetrominoShape,
        position: BinaryImage,
    },
    #[display("player is not working on puzzle {puzzle_id}")]
    PuzzleNotOwned { puzzle_id: PuzzleId },
    #[display("position {:#09x} overlaps filled cells of puzzle {puzzle_id}", position.bits())]
    PositionOccupied {
        puzzle_id: PuzzleId,
        position: BinaryImage,
    },
    #[display("player has no free puzzle slot")]
    NoFreePuzzleSlot,
    #[display("the {color} deck is empty")]
    DeckEmpty { color: PuzzleColor },
    #[display("puzzle {puzzle_id} is not in the row")]
    PuzzleNotInRow { puzzle_id: PuzzleId },
    #[display("only one black puzzle may be taken per turn at the end of the game")]
    BlackPuzzleAlreadyTaken,
    #[display("the {color} row is empty")]
    RowEmpty { color: PuzzleColor },
    #[display("puzzle {puzzle_id} appears more than once in the recycle order")]
    DuplicatePuzzleInOrder { puzzle_id: PuzzleId },
    #[display("master action was already used this turn")]
    MasterActionAlreadyUsed,
    #[display("master action needs at least one placement")]
    EmptyMasterAction,
    #[display("master action places more than one tetromino into puzzle {puzzle_id}")]
    DuplicatePuzzleInMasterAction { puzzle_id: PuzzleId },
}

/// Checks actions of one player against the current game state.
#[derive(Debug, Clone, Copy)]
pub struct ActionVerifier<'a> {
    shared: &'a SharedState,
    player: &'a PlayerState,
    turn: &'a TurnInfo,
}

impl<'a> ActionVerifier<'a> {
    #[must_use]
    pub fn new(shared: &'a SharedState, player: &'a PlayerState, turn: &'a TurnInfo) -> Self {
        Self {
            shared,
            player,
            turn,
        }
    }

    /// Verifies `action` for the player this verifier was created for.
    pub fn verify(&self, action: &Action) -> Result<(), VerificationFailure> {
        self.verify_phase(action)?;
        match action {
            Action::DoNothing | Action::EndFinishingTouches => Ok(()),
            Action::TakeBasicTetromino => self.verify_take_basic(),
            Action::ChangeTetromino { old, new } => self.verify_change(*old, *new),
            Action::PlaceTetromino(placement) => self.verify_placement(placement),
            Action::TakePuzzle(source) => self.verify_take_puzzle(*source),
            Action::Recycle { color, order } => self.verify_recycle(*color, order),
            Action::MasterAction(placements) => self.verify_master_action(placements),
        }
    }

    fn verify_phase(&self, action: &Action) -> Result<(), VerificationFailure> {
        match (self.turn.phase, action) {
            (GamePhase::Ended, _) => Err(VerificationFailure::GameEnded),
            (
                GamePhase::FinishingTouches,
                Action::PlaceTetromino(_) | Action::EndFinishingTouches,
            ) => Ok(()),
            (GamePhase::FinishingTouches, _) => {
                Err(VerificationFailure::NotAllowedInFinishingTouches {
                    kind: action.kind(),
                })
            }
            (_, Action::EndFinishingTouches) => Err(VerificationFailure::NotInFinishingTouches),
            _ => Ok(()),
        }
    }

    fn verify_take_basic(&self) -> Result<(), VerificationFailure> {
        let shape = TetrominoShape::BASIC;
        if self.shared.reserve()[shape] == 0 {
            return Err(VerificationFailure::ReserveEmpty { shape });
        }
        Ok(())
    }

    fn verify_change(
        &self,
        old: TetrominoShape,
        new: TetrominoShape,
    ) -> Result<(), VerificationFailure> {
        self.verify_owned(old, 1)?;
        if !old.change_options(self.shared.reserve()).contains(&new) {
            return Err(VerificationFailure::ChangeNotAllowed { old, new });
        }
        Ok(())
    }

    fn verify_owned(&self, shape: TetrominoShape, needed: u32) -> Result<(), VerificationFailure> {
        let owned = self.player.tetrominoes()[shape];
        if owned < needed {
            return Err(VerificationFailure::TetrominoNotOwned {
                shape,
                owned,
                needed,
            });
        }
        Ok(())
    }

    fn verify_placement(&self, placement: &Placement) -> Result<(), VerificationFailure> {
        let Placement {
            puzzle_id,
            shape,
            position,
        } = *placement;
        self.verify_owned(shape, 1)?;
        if !shape.matches(position) {
            return Err(VerificationFailure::ShapeMismatch { shape, position });
        }
        let puzzle = self
            .player
            .puzzle(puzzle_id)
            .ok_or(VerificationFailure::PuzzleNotOwned { puzzle_id })?;
        if !puzzle.can_place(position) {
            return Err(VerificationFailure::PositionOccupied {
                puzzle_id,
                position,
            });
        }
        Ok(())
    }

    fn verify_take_puzzle(&self, source: PuzzleSource) -> Result<(), VerificationFailure> {
        if !self.player.has_free_puzzle_slot() {
            return Err(VerificationFailure::NoFreePuzzleSlot);
        }
        let color = match source {
            PuzzleSource::TopOfDeck(color) => {
                if self.shared.is_deck_empty(color) {
                    return Err(VerificationFailure::DeckEmpty { color });
                }
                color
            }
            PuzzleSource::Row(puzzle_id) => self
                .shared
                .find_in_rows(puzzle_id)
                .ok_or(VerificationFailure::PuzzleNotInRow { puzzle_id })?
                .color(),
        };
        if color == PuzzleColor::Black && self.turn.is_end_game() && self.turn.took_black_puzzle {
            return Err(VerificationFailure::BlackPuzzleAlreadyTaken);
        }
        Ok(())
    }

    fn verify_recycle(
        &self,
        color: PuzzleColor,
        order: &[PuzzleId],
    ) -> Result<(), VerificationFailure> {
        let row = self.shared.row(color);
        if row.is_empty() {
            return Err(VerificationFailure::RowEmpty { color });
        }
        if let Some(&puzzle_id) = order.iter().find(|id| !row.contains(**id)) {
            return Err(VerificationFailure::PuzzleNotInRow { puzzle_id });
        }
        if let Some(puzzle) = row.puzzles().find(|puzzle| !order.contains(&puzzle.id())) {
            return Err(VerificationFailure::PuzzleNotInRow {
                puzzle_id: puzzle.id(),
            });
        }
        if let Some(puzzle_id) = first_duplicate(order.iter().copied()) {
            return Err(VerificationFailure::DuplicatePuzzleInOrder { puzzle_id });
        }
        Ok(())
    }

    fn verify_master_action(&self, placements: &[Placement]) -> Result<(), VerificationFailure> {
        if self.turn.used_master_action {
            return Err(VerificationFailure::MasterActionAlreadyUsed);
        }
        if placements.is_empty() {
            return Err(VerificationFailure::EmptyMasterAction);
        }
        if let Some(puzzle_id) = first_duplicate(placements.iter().map(|p| p.puzzle_id)) {
            return Err(VerificationFailure::DuplicatePuzzleInMasterAction { puzzle_id });
        }
        let needed: ShapeCounts = placements.iter().map(|p| p.shape).collect();
        if !self.player.tetrominoes().contains(&needed) {
            for (shape, count) in needed.iter() {
                self.verify_owned(shape, count)?;
            }
        }
        for placement in placements {
            self.verify_placement(placement)?;
        }
        Ok(())
    }
}

fn first_duplicate(ids: impl Iterator<Item = PuzzleId>) -> Option<PuzzleId> {
    let mut seen = Vec::new();
    for id in ids {
        if seen.contains(&id) {
            return Some(id);
        }
        seen.push(id);
    }
    None
}

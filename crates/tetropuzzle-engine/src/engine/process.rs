//! Action processing: the only code that mutates game state.
//!
//! The processor assumes the action already passed [`ActionVerifier`](crate::ActionVerifier).
//! Anything it still finds wrong is a broken invariant, not a rule violation.

use serde::Serialize;

use crate::core::{
    BinaryImage, Puzzle, PuzzleColor, PuzzleId, ShapeList, TetrominoShape,
};

use super::{
    action::{Action, Placement, PuzzleSource},
    event::GameEvent,
    player_state::PlayerState,
    shared_state::SharedState,
    turn::{GamePhase, Signal},
};

/// Processing found the state inconsistent with an action that was verified.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum InvariantViolation {
    #[display("player does not own a {shape}")]
    MissingTetromino { shape: TetrominoShape },
    #[display("the reserve has no {shape} to hand out")]
    ReserveExhausted { shape: TetrominoShape },
    #[display("the reserve would exceed its initial count of {shape}")]
    ReserveOverflow { shape: TetrominoShape },
    #[display("puzzle {puzzle_id} is not where the action expects it")]
    PuzzleMissing { puzzle_id: PuzzleId },
    #[display("position {:#09x} cannot be placed into puzzle {puzzle_id}", position.bits())]
    InvalidPlacement {
        puzzle_id: PuzzleId,
        position: BinaryImage,
    },
    #[display("player has no free puzzle slot")]
    NoFreePuzzleSlot,
    #[display("the {color} deck is empty")]
    DeckEmpty { color: PuzzleColor },
    #[display("the {color} row does not match the recycle order")]
    RecycleOrderMismatch { color: PuzzleColor },
}

/// What happened to the reward of a finished puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RewardGrant {
    /// The shape was moved from the reserve to the player.
    Granted(TetrominoShape),
    /// Several shapes are available; the player has to choose one.
    Pending { options: ShapeList },
    /// No shape was granted: the reserve had nothing suitable, or the puzzle
    /// was finished during finishing touches.
    NotGranted,
}

/// A puzzle completed by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishedPuzzle {
    pub puzzle_id: PuzzleId,
    pub reward_score: u32,
    pub reward_shape: TetrominoShape,
    pub reward: RewardGrant,
}

/// Result of processing one action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub signals: Vec<Signal>,
    pub finished_puzzles: Vec<FinishedPuzzle>,
    pub events: Vec<GameEvent>,
}

/// Applies verified actions of one player to the game state.
#[derive(Debug)]
pub struct ActionProcessor<'a> {
    shared: &'a mut SharedState,
    player: &'a mut PlayerState,
    phase: GamePhase,
    outcome: ProcessOutcome,
}

impl<'a> ActionProcessor<'a> {
    pub fn new(shared: &'a mut SharedState, player: &'a mut PlayerState, phase: GamePhase) -> Self {
        Self {
            shared,
            player,
            phase,
            outcome: ProcessOutcome::default(),
        }
    }

    /// Applies `action` and reports what changed.
    pub fn process(mut self, action: &Action) -> Result<ProcessOutcome, InvariantViolation> {
        tracing::debug!(player = %self.player.id(), %action, "processing action");
        let black_deck_had_puzzles = !self.shared.is_deck_empty(PuzzleColor::Black);
        match action {
            Action::DoNothing => {}
            Action::TakeBasicTetromino => {
                self.take_from_reserve(TetrominoShape::BASIC)?;
                self.inventory_changed();
            }
            Action::ChangeTetromino { old, new } => {
                self.remove_from_player(*old)?;
                if !self.shared.return_tetromino(*old) {
                    return Err(InvariantViolation::ReserveOverflow { shape: *old });
                }
                self.take_from_reserve(*new)?;
                self.inventory_changed();
            }
            Action::PlaceTetromino(placement) => {
                self.place(placement)?;
                self.inventory_changed();
            }
            Action::TakePuzzle(source) => self.take_puzzle(*source)?,
            Action::Recycle { color, order } => self.recycle(*color, order)?,
            Action::MasterAction(placements) => {
                for placement in placements {
                    self.place(placement)?;
                }
                self.inventory_changed();
                self.outcome.signals.push(Signal::MasterActionUsed);
            }
            Action::EndFinishingTouches => self.outcome.signals.push(Signal::PhaseEnded),
        }
        if black_deck_had_puzzles && self.shared.is_deck_empty(PuzzleColor::Black) {
            tracing::info!("black deck is empty");
            self.outcome.signals.push(Signal::BlackDeckEmpty);
        }
        Ok(self.outcome)
    }

    /// Moves a chosen reward shape from the reserve to the player.
    pub fn grant_reward(
        mut self,
        shape: TetrominoShape,
    ) -> Result<ProcessOutcome, InvariantViolation> {
        self.take_from_reserve(shape)?;
        self.inventory_changed();
        Ok(self.outcome)
    }

    fn take_from_reserve(&mut self, shape: TetrominoShape) -> Result<(), InvariantViolation> {
        if !self.shared.take_tetromino(shape) {
            return Err(InvariantViolation::ReserveExhausted { shape });
        }
        self.player.add_tetromino(shape);
        self.reserve_changed();
        Ok(())
    }

    fn remove_from_player(&mut self, shape: TetrominoShape) -> Result<(), InvariantViolation> {
        if !self.player.remove_tetromino(shape) {
            return Err(InvariantViolation::MissingTetromino { shape });
        }
        Ok(())
    }

    fn place(&mut self, placement: &Placement) -> Result<(), InvariantViolation> {
        let Placement {
            puzzle_id,
            shape,
            position,
        } = *placement;
        let puzzle = self
            .player
            .puzzle(puzzle_id)
            .ok_or(InvariantViolation::PuzzleMissing { puzzle_id })?;
        if !puzzle.can_place(position) || !shape.matches(position) {
            return Err(InvariantViolation::InvalidPlacement {
                puzzle_id,
                position,
            });
        }
        self.remove_from_player(shape)?;
        let puzzle = self
            .player
            .puzzle_mut(puzzle_id)
            .ok_or(InvariantViolation::PuzzleMissing { puzzle_id })?;
        puzzle.place(shape, position);
        let finished = puzzle.is_finished();
        self.push_event(GameEvent::TetrominoPlaced {
            player: self.player.id(),
            puzzle_id,
            shape,
            position,
        });

        if self.phase == GamePhase::FinishingTouches {
            self.player.add_score(-1);
            self.score_changed();
        }
        if finished {
            self.finish_puzzle(puzzle_id)?;
        }
        Ok(())
    }

    fn finish_puzzle(&mut self, puzzle_id: PuzzleId) -> Result<(), InvariantViolation> {
        let puzzle = self
            .player
            .remove_puzzle(puzzle_id)
            .ok_or(InvariantViolation::PuzzleMissing { puzzle_id })?;
        self.player.mark_finished(puzzle_id);
        self.push_event(GameEvent::PuzzleFinished {
            player: self.player.id(),
            puzzle_id,
        });

        let reward = if self.phase == GamePhase::FinishingTouches {
            RewardGrant::NotGranted
        } else {
            self.collect_reward(&puzzle)?
        };
        tracing::debug!(
            player = %self.player.id(),
            %puzzle_id,
            score = puzzle.reward_score(),
            ?reward,
            "puzzle finished"
        );
        self.outcome.finished_puzzles.push(FinishedPuzzle {
            puzzle_id,
            reward_score: puzzle.reward_score(),
            reward_shape: puzzle.reward_shape(),
            reward,
        });
        Ok(())
    }

    fn collect_reward(&mut self, puzzle: &Puzzle) -> Result<RewardGrant, InvariantViolation> {
        self.player
            .add_score(i32::try_from(puzzle.reward_score()).unwrap_or(i32::MAX));
        self.score_changed();
        self.player.add_tetrominoes(puzzle.used_tetrominoes());

        let options = puzzle.reward_shape().reward_options(self.shared.reserve());
        match options.as_slice() {
            [] => Ok(RewardGrant::NotGranted),
            [shape] => {
                let shape = *shape;
                self.take_from_reserve(shape)?;
                Ok(RewardGrant::Granted(shape))
            }
            _ => Ok(RewardGrant::Pending { options }),
        }
    }

    fn take_puzzle(&mut self, source: PuzzleSource) -> Result<(), InvariantViolation> {
        let (color, puzzle) = match source {
            PuzzleSource::TopOfDeck(color) => {
                let puzzle = self
                    .shared
                    .take_from_deck(color)
                    .ok_or(InvariantViolation::DeckEmpty { color })?;
                (color, puzzle)
            }
            PuzzleSource::Row(puzzle_id) => {
                let puzzle = self
                    .shared
                    .take_from_row(puzzle_id)
                    .ok_or(InvariantViolation::PuzzleMissing { puzzle_id })?;
                let color = puzzle.color();
                self.row_changed(color);
                (color, puzzle)
            }
        };
        let puzzle_id = puzzle.id();
        self.player
            .add_puzzle(puzzle)
            .map_err(|_| InvariantViolation::NoFreePuzzleSlot)?;
        self.deck_changed(color);
        self.push_event(GameEvent::PuzzleAdded {
            player: self.player.id(),
            puzzle_id,
        });
        if color == PuzzleColor::Black {
            self.outcome.signals.push(Signal::BlackPuzzleTaken);
        }
        Ok(())
    }

    fn recycle(&mut self, color: PuzzleColor, order: &[PuzzleId]) -> Result<(), InvariantViolation> {
        if !self.shared.recycle(color, order) {
            return Err(InvariantViolation::RecycleOrderMismatch { color });
        }
        self.row_changed(color);
        self.deck_changed(color);
        Ok(())
    }

    fn push_event(&mut self, event: GameEvent) {
        self.outcome.events.push(event);
    }

    fn reserve_changed(&mut self) {
        self.push_event(GameEvent::ReserveChanged {
            reserve: *self.shared.reserve(),
        });
    }

    fn inventory_changed(&mut self) {
        self.push_event(GameEvent::InventoryChanged {
            player: self.player.id(),
            tetrominoes: *self.player.tetrominoes(),
        });
    }

    fn score_changed(&mut self) {
        self.push_event(GameEvent::ScoreChanged {
            player: self.player.id(),
            score: self.player.score(),
        });
    }

    fn row_changed(&mut self, color: PuzzleColor) {
        self.push_event(GameEvent::RowChanged {
            color,
            puzzles: self.shared.row(color).puzzles().map(Puzzle::id).collect(),
        });
    }

    fn deck_changed(&mut self, color: PuzzleColor) {
        self.push_event(GameEvent::DeckChanged {
            color,
            len: self.shared.deck_len(color),
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{IdAllocator, PuzzleDefinition, ShapeCounts};

    use super::*;
    use crate::engine::player_state::PlayerId;

    fn definition(color: PuzzleColor, art: &str) -> PuzzleDefinition {
        PuzzleDefinition {
            color,
            reward_score: 3,
            reward_shape: TetrominoShape::I2,
            image: BinaryImage::from_ascii(art),
        }
    }

    const ONE_CELL_LEFT: &str = "\
        ####.\n\
        #####\n\
        #####\n\
        #####\n\
        #####";

    fn setup(white: usize, black: usize) -> (SharedState, PlayerState) {
        let mut ids = IdAllocator::new();
        let white: Vec<_> = (0..white)
            .map(|_| Puzzle::new(ids.allocate(), &definition(PuzzleColor::White, ONE_CELL_LEFT)))
            .collect();
        let black: Vec<_> = (0..black)
            .map(|_| Puzzle::new(ids.allocate(), &definition(PuzzleColor::Black, ONE_CELL_LEFT)))
            .collect();
        let shared = SharedState::new(ShapeCounts::splat(2), white, black);
        (shared, PlayerState::new(PlayerId::new(0)))
    }

    fn corner() -> BinaryImage {
        BinaryImage::from_bits(1 << 4).unwrap()
    }

    #[test]
    fn test_change_tetromino_swaps_with_reserve() {
        let (mut shared, mut player) = setup(0, 0);
        ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakeBasicTetromino)
            .unwrap();
        let action = Action::ChangeTetromino {
            old: TetrominoShape::O1,
            new: TetrominoShape::I2,
        };
        ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&action)
            .unwrap();
        assert_eq!(shared.reserve()[TetrominoShape::O1], 2);
        assert_eq!(shared.reserve()[TetrominoShape::I2], 1);
        assert!(player.owns(TetrominoShape::I2));
        assert!(!player.owns(TetrominoShape::O1));
    }

    #[test]
    fn test_finishing_puzzle_grants_single_reward() {
        let (mut shared, mut player) = setup(4, 0);
        let outcome = ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakePuzzle(PuzzleSource::Row(PuzzleId::new(0))))
            .unwrap();
        assert!(outcome.signals.is_empty());
        player.add_tetromino(TetrominoShape::O1);
        shared.take_tetromino(TetrominoShape::O1);

        let placement = Placement {
            puzzle_id: PuzzleId::new(0),
            shape: TetrominoShape::O1,
            position: corner(),
        };
        let outcome = ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::PlaceTetromino(placement))
            .unwrap();
        assert_eq!(
            outcome.finished_puzzles,
            [FinishedPuzzle {
                puzzle_id: PuzzleId::new(0),
                reward_score: 3,
                reward_shape: TetrominoShape::I2,
                reward: RewardGrant::Granted(TetrominoShape::I2),
            }]
        );
        assert_eq!(player.score(), 3);
        assert_eq!(player.finished_puzzles(), [PuzzleId::new(0)]);
        // The used O1 comes back together with the reward
        assert!(player.owns(TetrominoShape::O1));
        assert!(player.owns(TetrominoShape::I2));
        assert_eq!(player.puzzles().count(), 0);
    }

    #[test]
    fn test_reward_pending_when_several_options() {
        let (mut shared, mut player) = setup(1, 0);
        ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakePuzzle(PuzzleSource::TopOfDeck(PuzzleColor::White)))
            .unwrap_err();
        ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakePuzzle(PuzzleSource::Row(PuzzleId::new(0))))
            .unwrap();
        while shared.take_tetromino(TetrominoShape::I2) {}
        ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakeBasicTetromino)
            .unwrap();

        let placement = Placement {
            puzzle_id: PuzzleId::new(0),
            shape: TetrominoShape::O1,
            position: corner(),
        };
        let outcome = ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::PlaceTetromino(placement))
            .unwrap();
        let reward = &outcome.finished_puzzles[0].reward;
        assert_eq!(
            *reward,
            RewardGrant::Pending {
                options: [TetrominoShape::I3, TetrominoShape::L2].into_iter().collect()
            }
        );
    }

    #[test]
    fn test_finishing_touches_placement_costs_a_point() {
        let (mut shared, mut player) = setup(4, 0);
        ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakePuzzle(PuzzleSource::Row(PuzzleId::new(0))))
            .unwrap();
        player.add_tetromino(TetrominoShape::O1);
        shared.take_tetromino(TetrominoShape::O1);
        let placement = Placement {
            puzzle_id: PuzzleId::new(0),
            shape: TetrominoShape::O1,
            position: corner(),
        };
        let outcome = ActionProcessor::new(&mut shared, &mut player, GamePhase::FinishingTouches)
            .process(&Action::PlaceTetromino(placement))
            .unwrap();
        assert_eq!(player.score(), -1);
        assert_eq!(outcome.finished_puzzles[0].reward, RewardGrant::NotGranted);
        assert_eq!(player.finished_puzzles(), [PuzzleId::new(0)]);
        assert_eq!(player.tetrominoes().total(), 0);
        assert_eq!(player.unfinished_penalty(), 0);
    }

    #[test]
    fn test_black_deck_empty_signal() {
        let (mut shared, mut player) = setup(0, 5);
        let outcome = ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakePuzzle(PuzzleSource::Row(PuzzleId::new(1))))
            .unwrap();
        assert_eq!(
            outcome.signals,
            [Signal::BlackPuzzleTaken, Signal::BlackDeckEmpty]
        );
        let outcome = ActionProcessor::new(&mut shared, &mut player, GamePhase::Normal)
            .process(&Action::TakePuzzle(PuzzleSource::Row(PuzzleId::new(2))))
            .unwrap();
        assert_eq!(outcome.signals, [Signal::BlackPuzzleTaken]);
    }
}

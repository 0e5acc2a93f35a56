use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Puzzle, PuzzleId, ShapeCounts, TetrominoShape};

/// Maximum number of puzzles a player can work on at once.
pub const MAX_PLAYER_PUZZLES: usize = 4;

/// Seat index of a player (0-based, in turn order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl PlayerId {
    /// Creates the id of the player at `index`.
    ///
    /// Panics if `index` does not fit into a seat number.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn new(index: usize) -> Self {
        assert!(index <= u8::MAX as usize);
        Self(index as u8)
    }

    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Everything one player owns: score, tetrominoes and puzzles in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    id: PlayerId,
    score: i32,
    tetrominoes: ShapeCounts,
    puzzles: [Option<Puzzle>; MAX_PLAYER_PUZZLES],
    finished_puzzles: Vec<PuzzleId>,
}

impl PlayerState {
    #[must_use]
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            score: 0,
            tetrominoes: ShapeCounts::ZERO,
            puzzles: Default::default(),
            finished_puzzles: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    #[must_use]
    pub fn score(&self) -> i32 {
        self.score
    }

    pub(crate) fn add_score(&mut self, delta: i32) {
        self.score += delta;
    }

    #[must_use]
    pub fn tetrominoes(&self) -> &ShapeCounts {
        &self.tetrominoes
    }

    #[must_use]
    pub fn owns(&self, shape: TetrominoShape) -> bool {
        self.tetrominoes[shape] > 0
    }

    pub(crate) fn add_tetromino(&mut self, shape: TetrominoShape) {
        self.tetrominoes[shape] += 1;
    }

    pub(crate) fn add_tetrominoes(&mut self, counts: &ShapeCounts) {
        self.tetrominoes.add_all(counts);
    }

    /// Removes one piece of `shape`; returns `false` if the player has none.
    pub(crate) fn remove_tetromino(&mut self, shape: TetrominoShape) -> bool {
        if self.tetrominoes[shape] == 0 {
            return false;
        }
        self.tetrominoes[shape] -= 1;
        true
    }

    /// Puzzle slots in order; empty slots are `None`.
    #[must_use]
    pub fn puzzle_slots(&self) -> &[Option<Puzzle>; MAX_PLAYER_PUZZLES] {
        &self.puzzles
    }

    /// Puzzles in progress.
    pub fn puzzles(&self) -> impl Iterator<Item = &Puzzle> + '_ {
        self.puzzles.iter().flatten()
    }

    #[must_use]
    pub fn puzzle(&self, id: PuzzleId) -> Option<&Puzzle> {
        self.puzzles().find(|puzzle| puzzle.id() == id)
    }

    pub(crate) fn puzzle_mut(&mut self, id: PuzzleId) -> Option<&mut Puzzle> {
        self.puzzles
            .iter_mut()
            .flatten()
            .find(|puzzle| puzzle.id() == id)
    }

    #[must_use]
    pub fn has_free_puzzle_slot(&self) -> bool {
        self.puzzles.iter().any(Option::is_none)
    }

    /// Puts a puzzle into the first free slot, handing it back if all slots are used.
    pub(crate) fn add_puzzle(&mut self, puzzle: Puzzle) -> Result<(), Puzzle> {
        match self.puzzles.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(puzzle);
                Ok(())
            }
            None => Err(puzzle),
        }
    }

    pub(crate) fn remove_puzzle(&mut self, id: PuzzleId) -> Option<Puzzle> {
        self.puzzles
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|puzzle| puzzle.id() == id))?
            .take()
    }

    /// Ids of the puzzles this player has completed.
    #[must_use]
    pub fn finished_puzzles(&self) -> &[PuzzleId] {
        &self.finished_puzzles
    }

    pub(crate) fn mark_finished(&mut self, id: PuzzleId) {
        self.finished_puzzles.push(id);
    }

    /// Sum of the reward scores of puzzles still in progress.
    #[must_use]
    pub fn unfinished_penalty(&self) -> i32 {
        self.puzzles()
            .map(|puzzle| i32::try_from(puzzle.reward_score()).unwrap_or(i32::MAX))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{BinaryImage, PuzzleColor, PuzzleDefinition};

    use super::*;

    fn puzzle(id: u32) -> Puzzle {
        Puzzle::new(
            PuzzleId::new(id),
            &PuzzleDefinition {
                color: PuzzleColor::White,
                reward_score: id,
                reward_shape: TetrominoShape::O1,
                image: BinaryImage::EMPTY,
            },
        )
    }

    #[test]
    fn test_puzzle_slots() {
        let mut player = PlayerState::new(PlayerId::new(0));
        for id in 0..4 {
            assert!(player.has_free_puzzle_slot());
            player.add_puzzle(puzzle(id)).unwrap();
        }
        assert!(!player.has_free_puzzle_slot());
        assert!(player.add_puzzle(puzzle(9)).is_err());

        let removed = player.remove_puzzle(PuzzleId::new(1)).unwrap();
        assert_eq!(removed.id(), PuzzleId::new(1));
        assert!(player.puzzle_slots()[1].is_none());
        assert!(player.remove_puzzle(PuzzleId::new(1)).is_none());

        // New puzzles take the first free slot
        player.add_puzzle(puzzle(7)).unwrap();
        assert_eq!(player.puzzle_slots()[1].as_ref().unwrap().id(), PuzzleId::new(7));
        assert_eq!(player.unfinished_penalty(), 7 + 2 + 3);
    }

    #[test]
    fn test_tetromino_inventory() {
        let mut player = PlayerState::new(PlayerId::new(2));
        assert!(!player.remove_tetromino(TetrominoShape::T));
        player.add_tetromino(TetrominoShape::T);
        assert!(player.owns(TetrominoShape::T));
        assert!(player.remove_tetromino(TetrominoShape::T));
        assert_eq!(player.tetrominoes().total(), 0);
    }
}

use std::collections::VecDeque;

use serde::Serialize;

use crate::core::{Puzzle, PuzzleColor, PuzzleId, ShapeCounts, TetrominoShape};

/// Number of face-up slots in each puzzle row.
pub const ROW_SIZE: usize = 4;

/// A row of face-up puzzles; slots may be empty once the deck runs out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PuzzleRow {
    slots: [Option<Puzzle>; ROW_SIZE],
}

impl PuzzleRow {
    #[must_use]
    pub fn slots(&self) -> &[Option<Puzzle>; ROW_SIZE] {
        &self.slots
    }

    pub fn puzzles(&self) -> impl Iterator<Item = &Puzzle> + '_ {
        self.slots.iter().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.puzzles().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    #[must_use]
    pub fn get(&self, id: PuzzleId) -> Option<&Puzzle> {
        self.puzzles().find(|puzzle| puzzle.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: PuzzleId) -> bool {
        self.get(id).is_some()
    }

    fn take(&mut self, id: PuzzleId) -> Option<(usize, Puzzle)> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|puzzle| puzzle.id() == id))?;
        let puzzle = self.slots[index].take()?;
        Some((index, puzzle))
    }
}

/// State shared by all players: the tetromino reserve and the puzzle decks and rows.
///
/// # Invariants
///
/// - Each reserve count stays between 0 and the initial count for that shape.
/// - A puzzle is held in exactly one place: a deck, a row slot, a player's
///   puzzle slots, or nowhere once it has been finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedState {
    reserve: ShapeCounts,
    initial_reserve: ShapeCounts,
    white_deck: VecDeque<Puzzle>,
    black_deck: VecDeque<Puzzle>,
    white_row: PuzzleRow,
    black_row: PuzzleRow,
}

impl SharedState {
    /// Creates the shared state with full reserve and the given decks (top first).
    ///
    /// Rows are filled from the top of each deck.
    #[must_use]
    pub fn new(
        initial_reserve: ShapeCounts,
        white_deck: impl IntoIterator<Item = Puzzle>,
        black_deck: impl IntoIterator<Item = Puzzle>,
    ) -> Self {
        let mut this = Self {
            reserve: initial_reserve,
            initial_reserve,
            white_deck: white_deck.into_iter().collect(),
            black_deck: black_deck.into_iter().collect(),
            white_row: PuzzleRow::default(),
            black_row: PuzzleRow::default(),
        };
        this.refill_row(PuzzleColor::White);
        this.refill_row(PuzzleColor::Black);
        this
    }

    #[must_use]
    pub fn reserve(&self) -> &ShapeCounts {
        &self.reserve
    }

    #[must_use]
    pub fn initial_reserve(&self) -> &ShapeCounts {
        &self.initial_reserve
    }

    #[must_use]
    pub fn row(&self, color: PuzzleColor) -> &PuzzleRow {
        match color {
            PuzzleColor::White => &self.white_row,
            PuzzleColor::Black => &self.black_row,
        }
    }

    fn row_mut(&mut self, color: PuzzleColor) -> &mut PuzzleRow {
        match color {
            PuzzleColor::White => &mut self.white_row,
            PuzzleColor::Black => &mut self.black_row,
        }
    }

    #[must_use]
    pub fn deck_len(&self, color: PuzzleColor) -> usize {
        self.deck(color).len()
    }

    #[must_use]
    pub fn is_deck_empty(&self, color: PuzzleColor) -> bool {
        self.deck(color).is_empty()
    }

    fn deck(&self, color: PuzzleColor) -> &VecDeque<Puzzle> {
        match color {
            PuzzleColor::White => &self.white_deck,
            PuzzleColor::Black => &self.black_deck,
        }
    }

    fn deck_mut(&mut self, color: PuzzleColor) -> &mut VecDeque<Puzzle> {
        match color {
            PuzzleColor::White => &mut self.white_deck,
            PuzzleColor::Black => &mut self.black_deck,
        }
    }

    /// All face-up puzzles of both rows.
    pub fn row_puzzles(&self) -> impl Iterator<Item = &Puzzle> + '_ {
        self.white_row.puzzles().chain(self.black_row.puzzles())
    }

    /// Finds a face-up puzzle by id in either row.
    #[must_use]
    pub fn find_in_rows(&self, id: PuzzleId) -> Option<&Puzzle> {
        self.white_row.get(id).or_else(|| self.black_row.get(id))
    }

    /// Removes a puzzle from its row and refills the emptied slot from the deck.
    pub fn take_from_row(&mut self, id: PuzzleId) -> Option<Puzzle> {
        for color in PuzzleColor::ALL {
            if let Some((index, puzzle)) = self.row_mut(color).take(id) {
                let replacement = self.deck_mut(color).pop_front();
                self.row_mut(color).slots[index] = replacement;
                return Some(puzzle);
            }
        }
        None
    }

    /// Removes the top puzzle of a deck.
    pub fn take_from_deck(&mut self, color: PuzzleColor) -> Option<Puzzle> {
        self.deck_mut(color).pop_front()
    }

    /// Moves every puzzle of a row to the bottom of its deck in the given order,
    /// then refills the row.
    ///
    /// Returns `false` without changing anything unless `order` lists exactly the
    /// puzzles of the row.
    pub fn recycle(&mut self, color: PuzzleColor, order: &[PuzzleId]) -> bool {
        let row = self.row(color);
        let is_permutation = order.len() == row.len()
            && order
                .iter()
                .enumerate()
                .all(|(i, id)| row.contains(*id) && !order[..i].contains(id));
        if !is_permutation {
            return false;
        }
        for id in order {
            let Some((_, puzzle)) = self.row_mut(color).take(*id) else {
                return false;
            };
            self.deck_mut(color).push_back(puzzle);
        }
        self.refill_row(color);
        true
    }

    /// Fills every empty slot of a row from the top of its deck, left to right.
    pub fn refill_row(&mut self, color: PuzzleColor) {
        for index in 0..ROW_SIZE {
            if self.row(color).slots[index].is_some() {
                continue;
            }
            let Some(puzzle) = self.deck_mut(color).pop_front() else {
                break;
            };
            self.row_mut(color).slots[index] = Some(puzzle);
        }
    }

    /// Takes one piece of `shape` out of the reserve.
    ///
    /// Returns `false` if the reserve has none left.
    pub fn take_tetromino(&mut self, shape: TetrominoShape) -> bool {
        if self.reserve[shape] == 0 {
            return false;
        }
        self.reserve[shape] -= 1;
        true
    }

    /// Puts one piece of `shape` back into the reserve.
    ///
    /// Returns `false` if the reserve is already at its initial count.
    pub fn return_tetromino(&mut self, shape: TetrominoShape) -> bool {
        if self.reserve[shape] >= self.initial_reserve[shape] {
            return false;
        }
        self.reserve[shape] += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{BinaryImage, IdAllocator, PuzzleDefinition};

    use super::*;

    fn puzzles(ids: &mut IdAllocator, color: PuzzleColor, count: usize) -> Vec<Puzzle> {
        let definition = PuzzleDefinition {
            color,
            reward_score: 1,
            reward_shape: TetrominoShape::O1,
            image: BinaryImage::EMPTY,
        };
        (0..count)
            .map(|_| Puzzle::new(ids.allocate(), &definition))
            .collect()
    }

    fn row_ids(state: &SharedState, color: PuzzleColor) -> Vec<u32> {
        state.row(color).puzzles().map(|p| p.id().get()).collect()
    }

    #[test]
    fn test_rows_filled_from_deck_top() {
        let mut ids = IdAllocator::new();
        let white = puzzles(&mut ids, PuzzleColor::White, 6);
        let black = puzzles(&mut ids, PuzzleColor::Black, 2);
        let state = SharedState::new(ShapeCounts::splat(15), white, black);

        assert_eq!(row_ids(&state, PuzzleColor::White), [0, 1, 2, 3]);
        assert_eq!(state.deck_len(PuzzleColor::White), 2);
        assert_eq!(row_ids(&state, PuzzleColor::Black), [6, 7]);
        assert!(state.is_deck_empty(PuzzleColor::Black));
    }

    #[test]
    fn test_take_from_row_refills_slot() {
        let mut ids = IdAllocator::new();
        let white = puzzles(&mut ids, PuzzleColor::White, 5);
        let mut state = SharedState::new(ShapeCounts::splat(15), white, []);

        let taken = state.take_from_row(PuzzleId::new(1)).unwrap();
        assert_eq!(taken.id(), PuzzleId::new(1));
        assert_eq!(row_ids(&state, PuzzleColor::White), [0, 4, 2, 3]);
        assert!(state.take_from_row(PuzzleId::new(1)).is_none());

        state.take_from_row(PuzzleId::new(0)).unwrap();
        assert_eq!(state.row(PuzzleColor::White).len(), 3);
        assert!(state.row(PuzzleColor::White).slots()[0].is_none());
    }

    #[test]
    fn test_recycle_moves_row_to_deck_bottom() {
        let mut ids = IdAllocator::new();
        let white = puzzles(&mut ids, PuzzleColor::White, 6);
        let mut state = SharedState::new(ShapeCounts::splat(15), white, []);

        let order = [3, 1, 0, 2].map(PuzzleId::new);
        assert!(state.recycle(PuzzleColor::White, &order));
        // Deck was [4, 5], then [4, 5, 3, 1, 0, 2]; the row takes the first four
        assert_eq!(row_ids(&state, PuzzleColor::White), [4, 5, 3, 1]);
        assert_eq!(state.deck_len(PuzzleColor::White), 2);
    }

    #[test]
    fn test_recycle_rejects_incomplete_order() {
        let mut ids = IdAllocator::new();
        let white = puzzles(&mut ids, PuzzleColor::White, 4);
        let mut state = SharedState::new(ShapeCounts::splat(15), white, []);
        let before = state.clone();

        assert!(!state.recycle(PuzzleColor::White, &[0, 1, 2].map(PuzzleId::new)));
        assert!(!state.recycle(PuzzleColor::White, &[0, 1, 2, 2].map(PuzzleId::new)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_reserve_bounds() {
        let mut state = SharedState::new(ShapeCounts::splat(1), [], []);
        assert!(!state.return_tetromino(TetrominoShape::O1));
        assert!(state.take_tetromino(TetrominoShape::O1));
        assert!(!state.take_tetromino(TetrominoShape::O1));
        assert!(state.return_tetromino(TetrominoShape::O1));
        assert_eq!(state.reserve()[TetrominoShape::O1], 1);
    }
}

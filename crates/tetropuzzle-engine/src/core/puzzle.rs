use std::fmt;

use serde::{Deserialize, Serialize};

use super::{binary_image::BinaryImage, shape::TetrominoShape, shape_counts::ShapeCounts};

/// Unique identifier of a puzzle within a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct PuzzleId(u32);

impl fmt::Display for PuzzleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl PuzzleId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Monotonic source of [`PuzzleId`]s.
///
/// Owned by game setup; ids are never reused within one allocator.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn allocate(&mut self) -> PuzzleId {
        let id = PuzzleId(self.next);
        self.next += 1;
        id
    }
}

/// Puzzle deck a puzzle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleColor {
    #[display("white")]
    White,
    #[display("black")]
    Black,
}

impl PuzzleColor {
    pub const ALL: [Self; 2] = [Self::White, Self::Black];
}

/// A puzzle as supplied by a puzzle source.
///
/// Cells set in `image` are not part of the puzzle; the remaining empty cells are
/// what players fill with tetrominoes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PuzzleDefinition {
    pub color: PuzzleColor,
    pub reward_score: u32,
    pub reward_shape: TetrominoShape,
    pub image: BinaryImage,
}

/// A puzzle in play.
///
/// The only mutation is [`Puzzle::place`], which fills cells and records which
/// shape was used. A puzzle is finished once every cell is filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Puzzle {
    id: PuzzleId,
    color: PuzzleColor,
    reward_score: u32,
    reward_shape: TetrominoShape,
    image: BinaryImage,
    used_tetrominoes: ShapeCounts,
}

impl Puzzle {
    #[must_use]
    pub fn new(id: PuzzleId, definition: &PuzzleDefinition) -> Self {
        Self {
            id,
            color: definition.color,
            reward_score: definition.reward_score,
            reward_shape: definition.reward_shape,
            image: definition.image,
            used_tetrominoes: ShapeCounts::ZERO,
        }
    }

    #[must_use]
    pub fn id(&self) -> PuzzleId {
        self.id
    }

    #[must_use]
    pub fn color(&self) -> PuzzleColor {
        self.color
    }

    #[must_use]
    pub fn reward_score(&self) -> u32 {
        self.reward_score
    }

    #[must_use]
    pub fn reward_shape(&self) -> TetrominoShape {
        self.reward_shape
    }

    #[must_use]
    pub fn image(&self) -> BinaryImage {
        self.image
    }

    #[must_use]
    pub fn used_tetrominoes(&self) -> &ShapeCounts {
        &self.used_tetrominoes
    }

    #[must_use]
    pub fn empty_cells(&self) -> u32 {
        self.image.count_empty()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.image.is_full()
    }

    /// Checks if `position` fits into the empty part of the puzzle.
    #[must_use]
    pub fn can_place(&self, position: BinaryImage) -> bool {
        !self.image.overlaps(position)
    }

    /// Fills the cells of `position` with a piece of `shape`.
    ///
    /// The caller must have checked [`Self::can_place`] and that `position` is `shape`.
    pub fn place(&mut self, shape: TetrominoShape, position: BinaryImage) {
        debug_assert!(self.can_place(position));
        debug_assert!(shape.matches(position));
        self.image = self.image | position;
        self.used_tetrominoes[shape] += 1;
    }
}

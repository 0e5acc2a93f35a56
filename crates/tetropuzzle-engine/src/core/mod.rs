//! Geometry and entity types shared by the rule engine and the search adapter.
//!
//! - [`BinaryImage`] - 25-bit packed 5×5 grid with move/rotate/flip transforms
//! - [`TetrominoShape`] - the nine piece shapes with their orientation and placement tables
//! - [`ShapeCounts`] - per-shape counters used for reserves and inventories
//! - [`Puzzle`] - a puzzle being filled, created from a [`PuzzleDefinition`]

pub use self::{binary_image::*, puzzle::*, shape::*, shape_counts::*};

pub(crate) mod binary_image;
pub(crate) mod puzzle;
pub(crate) mod shape;
pub(crate) mod shape_counts;

/// Width and height of every puzzle grid.
pub const GRID_SIZE: usize = 5;
/// Number of cells in a puzzle grid.
pub const GRID_CELLS: usize = GRID_SIZE * GRID_SIZE;

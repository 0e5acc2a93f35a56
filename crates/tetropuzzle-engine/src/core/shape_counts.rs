use std::{
    collections::BTreeMap,
    ops::{Index, IndexMut},
};

use serde::{Deserialize, Serialize};

use super::shape::TetrominoShape;

/// A counter per [`TetrominoShape`].
///
/// Used for the shared reserve, player inventories and the pieces used on a puzzle.
/// Serialized as a map from shape name to count, omitting zero entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeCounts {
    counts: [u32; TetrominoShape::LEN],
}

impl Serialize for ShapeCounts {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.iter().filter(|(_, count)| *count > 0))
    }
}

impl<'de> Deserialize<'de> for ShapeCounts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = BTreeMap::<TetrominoShape, u32>::deserialize(deserializer)?;
        let mut counts = Self::ZERO;
        for (shape, count) in map {
            counts[shape] = count;
        }
        Ok(counts)
    }
}

impl Index<TetrominoShape> for ShapeCounts {
    type Output = u32;

    fn index(&self, shape: TetrominoShape) -> &u32 {
        &self.counts[shape.index()]
    }
}

impl IndexMut<TetrominoShape> for ShapeCounts {
    fn index_mut(&mut self, shape: TetrominoShape) -> &mut u32 {
        &mut self.counts[shape.index()]
    }
}

impl FromIterator<TetrominoShape> for ShapeCounts {
    fn from_iter<I: IntoIterator<Item = TetrominoShape>>(iter: I) -> Self {
        let mut counts = Self::ZERO;
        for shape in iter {
            counts[shape] += 1;
        }
        counts
    }
}

impl ShapeCounts {
    pub const ZERO: Self = Self {
        counts: [0; TetrominoShape::LEN],
    };

    /// Creates counts with the same value for every shape.
    #[must_use]
    pub const fn splat(count: u32) -> Self {
        Self {
            counts: [count; TetrominoShape::LEN],
        }
    }

    /// Iterates over `(shape, count)` pairs in table order, including zeros.
    pub fn iter(&self) -> impl Iterator<Item = (TetrominoShape, u32)> + '_ {
        TetrominoShape::ALL
            .into_iter()
            .map(|shape| (shape, self[shape]))
    }

    /// Shapes with a positive count.
    pub fn available(&self) -> impl Iterator<Item = TetrominoShape> + '_ {
        self.iter()
            .filter(|(_, count)| *count > 0)
            .map(|(shape, _)| shape)
    }

    /// Total number of pieces over all shapes.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Checks if every count in `other` is at most the count in `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.counts
            .iter()
            .zip(&other.counts)
            .all(|(have, need)| have >= need)
    }

    /// Adds every count of `other` to `self`.
    pub fn add_all(&mut self, other: &Self) {
        for (count, added) in self.counts.iter_mut().zip(&other.counts) {
            *count += added;
        }
    }
}

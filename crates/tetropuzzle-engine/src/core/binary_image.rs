use std::{
    fmt,
    ops::{BitAnd, BitOr, Not},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use super::{GRID_CELLS, GRID_SIZE};

// Full grid (all 25 cells set)
const FULL_MASK: u32 = (1 << GRID_CELLS) - 1;
// Boundary rows/columns used to decide whether a shift would lose cells
const TOP_ROW_MASK: u32 = 0b11111;
const BOTTOM_ROW_MASK: u32 = TOP_ROW_MASK << (GRID_SIZE * (GRID_SIZE - 1));
const LEFT_COLUMN_MASK: u32 = 0b00001_00001_00001_00001_00001;
const RIGHT_COLUMN_MASK: u32 = LEFT_COLUMN_MASK << (GRID_SIZE - 1);

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("value {value:#x} does not fit into a 5x5 image")]
pub struct OutOfRangeError {
    value: u32,
}

/// A 5×5 binary grid packed into the low 25 bits of a `u32`.
///
/// # Bit Layout
///
/// Bit `5 * row + col` represents the cell at (`row`, `col`), with row 0 at the top
/// and column 0 on the left. The top-left cell is therefore bit 0:
///
/// ```text
///  0  1  2  3  4
///  5  6  7  8  9
/// 10 11 12 13 14
/// 15 16 17 18 19
/// 20 21 22 23 24
/// ```
///
/// Images are immutable values; every transformation returns a new image.
///
/// # Example
///
/// ```
/// use tetropuzzle_engine::BinaryImage;
///
/// let image = BinaryImage::from_bits(0b1).unwrap();
/// assert_eq!(image.count_filled(), 1);
/// assert_eq!(image.move_right().move_down().bits(), 1 << 6);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinaryImage {
    bits: u32,
}

impl Serialize for BinaryImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Format: "#####/#...#/#...#/#...#/#####" (rows top to bottom)
        serializer.serialize_str(&self.to_row_string())
    }
}

impl<'de> Deserialize<'de> for BinaryImage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ParseImageError {
    #[display("expected {GRID_SIZE} '/'-separated rows, got {count}")]
    RowCount { count: usize },
    #[display("row {row} must have exactly {GRID_SIZE} cells, got '{line}'")]
    RowLength { row: usize, line: String },
    #[display("invalid cell '{ch}' at row {row}, column {col}")]
    InvalidCell { ch: char, row: usize, col: usize },
}

/// Parses the row format used for serialization: five rows of `#` and `.`
/// separated by `/`, top row first.
///
/// ```
/// use tetropuzzle_engine::BinaryImage;
///
/// let image: BinaryImage = "#####/#..##/#####/#####/#####".parse().unwrap();
/// assert_eq!(image.count_empty(), 2);
/// assert!("#####/#####".parse::<BinaryImage>().is_err());
/// ```
impl FromStr for BinaryImage {
    type Err = ParseImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: Vec<&str> = s.split('/').collect();
        if rows.len() != GRID_SIZE {
            return Err(ParseImageError::RowCount { count: rows.len() });
        }

        let mut bits = 0;
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != GRID_SIZE {
                return Err(ParseImageError::RowLength {
                    row,
                    line: (*line).to_owned(),
                });
            }
            for (col, ch) in line.chars().enumerate() {
                match ch {
                    '#' => bits |= 1 << (row * GRID_SIZE + col),
                    '.' => {}
                    _ => return Err(ParseImageError::InvalidCell { ch, row, col }),
                }
            }
        }
        Ok(Self { bits })
    }
}

impl fmt::Display for BinaryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..GRID_SIZE {
            if row > 0 {
                writeln!(f)?;
            }
            for col in 0..GRID_SIZE {
                let ch = if self.is_cell_filled(row, col) { '#' } else { '.' };
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

impl BinaryImage {
    pub const EMPTY: Self = Self { bits: 0 };
    pub const FULL: Self = Self { bits: FULL_MASK };

    /// Creates an image from raw bits.
    pub const fn from_bits(bits: u32) -> Result<Self, OutOfRangeError> {
        if bits > FULL_MASK {
            return Err(OutOfRangeError { value: bits });
        }
        Ok(Self { bits })
    }

    /// Creates an image from raw bits known to be in range.
    pub(crate) const fn from_bits_truncate(bits: u32) -> Self {
        Self {
            bits: bits & FULL_MASK,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    #[must_use]
    pub const fn is_cell_filled(self, row: usize, col: usize) -> bool {
        (self.bits & (1 << (row * GRID_SIZE + col))) != 0
    }

    /// Iterates over the (`row`, `col`) coordinates of all filled cells.
    pub fn filled_cells(self) -> impl Iterator<Item = (usize, usize)> {
        (0..GRID_CELLS)
            .filter(move |i| (self.bits & (1 << i)) != 0)
            .map(|i| (i / GRID_SIZE, i % GRID_SIZE))
    }

    #[must_use]
    pub const fn move_up(self) -> Self {
        if self.bits & TOP_ROW_MASK != 0 {
            return self;
        }
        Self {
            bits: self.bits >> GRID_SIZE,
        }
    }

    #[must_use]
    pub const fn move_down(self) -> Self {
        if self.bits & BOTTOM_ROW_MASK != 0 {
            return self;
        }
        Self {
            bits: self.bits << GRID_SIZE,
        }
    }

    #[must_use]
    pub const fn move_left(self) -> Self {
        if self.bits & LEFT_COLUMN_MASK != 0 {
            return self;
        }
        Self {
            bits: self.bits >> 1,
        }
    }

    #[must_use]
    pub const fn move_right(self) -> Self {
        if self.bits & RIGHT_COLUMN_MASK != 0 {
            return self;
        }
        Self {
            bits: self.bits << 1,
        }
    }

    /// Rotates 90° clockwise around the grid center: `(i, j) -> (j, 4 - i)`.
    #[must_use]
    pub fn rotate_right(self) -> Self {
        self.permute(|i, j| (j, GRID_SIZE - 1 - i))
    }

    /// Rotates 90° counterclockwise around the grid center: `(i, j) -> (4 - j, i)`.
    #[must_use]
    pub fn rotate_left(self) -> Self {
        self.permute(|i, j| (GRID_SIZE - 1 - j, i))
    }

    /// Mirrors across the vertical center axis: `(i, j) -> (i, 4 - j)`.
    #[must_use]
    pub fn flip_horizontal(self) -> Self {
        self.permute(|i, j| (i, GRID_SIZE - 1 - j))
    }

    /// Mirrors across the horizontal center axis: `(i, j) -> (4 - i, j)`.
    #[must_use]
    pub fn flip_vertical(self) -> Self {
        self.permute(|i, j| (GRID_SIZE - 1 - i, j))
    }

    /// Translates the pattern as far up and left as possible.
    ///
    /// The result is independent of the pattern's original position, which makes it
    /// a canonical form for comparing shapes.
    #[must_use]
    pub fn move_to_top_left(self) -> Self {
        let mut image = self;
        loop {
            let moved = image.move_up().move_left();
            if moved == image {
                return image;
            }
            image = moved;
        }
    }

    #[must_use]
    pub const fn count_filled(self) -> u32 {
        self.bits.count_ones()
    }

    #[must_use]
    pub const fn count_empty(self) -> u32 {
        GRID_CELLS as u32 - self.count_filled()
    }

    #[must_use]
    pub const fn is_full(self) -> bool {
        self.bits == FULL_MASK
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        (self.bits & other.bits) != 0
    }

    fn permute<F>(self, f: F) -> Self
    where
        F: Fn(usize, usize) -> (usize, usize),
    {
        let mut bits = 0;
        for (i, j) in self.filled_cells() {
            let (ni, nj) = f(i, j);
            bits |= 1 << (ni * GRID_SIZE + nj);
        }
        Self { bits }
    }

    fn to_row_string(self) -> String {
        let mut s = String::with_capacity(GRID_CELLS + GRID_SIZE - 1);
        for (row, line) in self.to_string().lines().enumerate() {
            if row > 0 {
                s.push('/');
            }
            s.push_str(line);
        }
        s
    }

    /// Creates an image from ASCII art.
    ///
    /// `#` is a filled cell and `.` an empty one; other characters are ignored.
    /// Blank lines are skipped, so the art may be indented inside raw strings.
    /// Panics unless exactly 5 rows of 5 cells are given.
    #[must_use]
    pub fn from_ascii(art: &str) -> Self {
        let lines: Vec<&str> = art.lines().filter(|line| !line.trim().is_empty()).collect();
        assert_eq!(
            lines.len(),
            GRID_SIZE,
            "Image must have exactly {GRID_SIZE} rows, got {}",
            lines.len()
        );

        let mut bits = 0;
        for (row, line) in lines.iter().enumerate() {
            let chars: Vec<char> = line.chars().filter(|c| *c == '#' || *c == '.').collect();
            assert_eq!(
                chars.len(),
                GRID_SIZE,
                "Each row must have exactly {GRID_SIZE} cells, got {} at row {row}",
                chars.len(),
            );
            for (col, &ch) in chars.iter().enumerate() {
                if ch == '#' {
                    bits |= 1 << (row * GRID_SIZE + col);
                }
            }
        }
        Self { bits }
    }
}

impl BitAnd for BinaryImage {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self {
            bits: self.bits & rhs.bits,
        }
    }
}

impl BitOr for BinaryImage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

impl Not for BinaryImage {
    type Output = Self;

    fn not(self) -> Self {
        Self {
            bits: !self.bits & FULL_MASK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(art: &str) -> BinaryImage {
        BinaryImage::from_ascii(art)
    }

    #[test]
    fn test_from_bits_range() {
        assert!(BinaryImage::from_bits(0).is_ok());
        assert!(BinaryImage::from_bits(FULL_MASK).is_ok());
        assert!(BinaryImage::from_bits(FULL_MASK + 1).is_err());
        assert!(BinaryImage::from_bits(u32::MAX).is_err());
    }

    #[test]
    fn test_counts() {
        let img = BinaryImage::from_bits(0b1).unwrap();
        assert_eq!(img.count_filled(), 1);
        assert_eq!(img.count_empty(), 24);
        assert_eq!(BinaryImage::FULL.count_empty(), 0);
        assert!(BinaryImage::FULL.is_full());
        assert!(BinaryImage::EMPTY.is_empty());
    }

    #[test]
    fn test_move_is_noop_at_boundary() {
        let top_left = BinaryImage::from_bits(0b1).unwrap();
        assert_eq!(top_left.move_up(), top_left);
        assert_eq!(top_left.move_left(), top_left);
        assert_eq!(top_left.move_right().bits(), 0b10);
        assert_eq!(top_left.move_down().bits(), 1 << 5);

        let bottom_right = BinaryImage::from_bits(1 << 24).unwrap();
        assert_eq!(bottom_right.move_down(), bottom_right);
        assert_eq!(bottom_right.move_right(), bottom_right);
    }

    #[test]
    fn test_move_does_not_wrap_rows() {
        // A cell in column 4 must not move into column 0 of the next row
        let right_edge = image(
            r"
            ....#
            .....
            .....
            .....
            .....
            ",
        );
        assert_eq!(right_edge.move_right(), right_edge);
        assert_eq!(right_edge.move_left().bits(), 1 << 3);
    }

    #[test]
    fn test_rotate_right_maps_cells() {
        let img = image(
            r"
            ##...
            .....
            .....
            .....
            .....
            ",
        );
        let expected = image(
            r"
            ....#
            ....#
            .....
            .....
            .....
            ",
        );
        assert_eq!(img.rotate_right(), expected);
        assert_eq!(expected.rotate_left(), img);
    }

    #[test]
    fn test_rotation_round_trips() {
        for bits in [0b1, 0b1100011, 0b11000010, 0x0155_5555 & FULL_MASK, 0x00AB_CDEF & FULL_MASK] {
            let img = BinaryImage::from_bits(bits).unwrap();
            assert_eq!(img.rotate_right().rotate_left(), img);
            assert_eq!(img.rotate_left().rotate_right(), img);
            let four = img.rotate_right().rotate_right().rotate_right().rotate_right();
            assert_eq!(four, img);
            assert_eq!(img.flip_horizontal().flip_horizontal(), img);
            assert_eq!(img.flip_vertical().flip_vertical(), img);
            assert_eq!(img.rotate_right().count_filled(), img.count_filled());
        }
    }

    #[test]
    fn test_flips() {
        let img = image(
            r"
            #....
            #....
            .....
            .....
            .....
            ",
        );
        assert_eq!(
            img.flip_horizontal(),
            image(
                r"
                ....#
                ....#
                .....
                .....
                .....
                ",
            )
        );
        assert_eq!(
            img.flip_vertical(),
            image(
                r"
                .....
                .....
                .....
                #....
                #....
                ",
            )
        );
    }

    #[test]
    fn test_move_to_top_left() {
        let img = image(
            r"
            .....
            .....
            ...#.
            ..###
            .....
            ",
        );
        let expected = image(
            r"
            .#...
            ###..
            .....
            .....
            .....
            ",
        );
        assert_eq!(img.move_to_top_left(), expected);
        assert_eq!(expected.move_to_top_left(), expected);
        assert_eq!(BinaryImage::EMPTY.move_to_top_left(), BinaryImage::EMPTY);
    }

    #[test]
    fn test_bit_ops() {
        let a = BinaryImage::from_bits(0b0011).unwrap();
        let b = BinaryImage::from_bits(0b0110).unwrap();
        assert_eq!((a & b).bits(), 0b0010);
        assert_eq!((a | b).bits(), 0b0111);
        assert_eq!((!a).count_filled(), 23);
        assert!(a.overlaps(b));
        assert!(!a.overlaps(!a));
    }

    #[test]
    fn test_display_and_ascii_agree() {
        let art = "#...#\n.#.#.\n..#..\n.#.#.\n#...#";
        let img = BinaryImage::from_ascii(art);
        assert_eq!(img.to_string(), art);
        assert_eq!(img.count_filled(), 9);
    }

    #[test]
    fn test_serialization() {
        let img = image(
            r"
            #####
            #...#
            #...#
            #...#
            #####
            ",
        );
        let serialized = serde_json::to_string(&img).unwrap();
        assert_eq!(serialized, "\"#####/#...#/#...#/#...#/#####\"");

        let deserialized: BinaryImage = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, img);
    }

    #[test]
    fn test_deserialization_error_cases() {
        assert!(serde_json::from_str::<BinaryImage>("\"#####/#####\"").is_err());
        assert!(serde_json::from_str::<BinaryImage>("\"####/#####/#####/#####/#####\"").is_err());
        assert!(serde_json::from_str::<BinaryImage>("\"####x/#####/#####/#####/#####\"").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "#####/#####".parse::<BinaryImage>(),
            Err(ParseImageError::RowCount { count: 2 })
        );
        assert_eq!(
            "#####/#####/###/#####/#####".parse::<BinaryImage>(),
            Err(ParseImageError::RowLength {
                row: 2,
                line: "###".to_owned()
            })
        );
        assert_eq!(
            "#####/#####/#####/#####/####o".parse::<BinaryImage>(),
            Err(ParseImageError::InvalidCell {
                ch: 'o',
                row: 4,
                col: 4
            })
        );
    }
}

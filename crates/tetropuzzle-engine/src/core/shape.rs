use std::{
    collections::BTreeSet,
    fmt,
    str::FromStr,
    sync::{LazyLock, OnceLock},
};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::{GRID_SIZE, binary_image::BinaryImage, shape_counts::ShapeCounts};

/// A set of shapes, in table order, such as the options for an exchange or a reward.
pub type ShapeList = ArrayVec<TetrominoShape, { TetrominoShape::LEN }>;

/// One of the nine tetromino shapes.
///
/// The name encodes the outline and the number of cells: `O1` is a single cell,
/// `I2`..`I4` are straight lines, `L2`/`L3` are corners with legs of length 2 and 3,
/// `O2` is the 2×2 square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[repr(u8)]
pub enum TetrominoShape {
    O1 = 0,
    O2 = 1,
    I2 = 2,
    I3 = 3,
    I4 = 4,
    L2 = 5,
    L3 = 6,
    Z = 7,
    T = 8,
}

impl fmt::Display for TetrominoShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown tetromino shape '{name}'")]
pub struct UnknownShapeError {
    name: String,
}

impl FromStr for TetrominoShape {
    type Err = UnknownShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownShapeError { name: s.to_owned() })
    }
}

impl TetrominoShape {
    /// Number of shapes (9).
    pub const LEN: usize = 9;

    /// Highest level (cell count) of any shape.
    pub const MAX_LEVEL: u32 = 4;

    /// All shapes in table order.
    pub const ALL: [Self; Self::LEN] = [
        Self::O1,
        Self::O2,
        Self::I2,
        Self::I3,
        Self::I4,
        Self::L2,
        Self::L3,
        Self::Z,
        Self::T,
    ];

    /// The single-cell shape players can take from the reserve for free.
    pub const BASIC: Self = Self::O1;

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::O1 => "O1",
            Self::O2 => "O2",
            Self::I2 => "I2",
            Self::I3 => "I3",
            Self::I4 => "I4",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::Z => "Z",
            Self::T => "T",
        }
    }

    /// Parses a shape from its name.
    ///
    /// ```
    /// use tetropuzzle_engine::TetrominoShape;
    ///
    /// assert_eq!(TetrominoShape::from_name("L3"), Some(TetrominoShape::L3));
    /// assert_eq!(TetrominoShape::from_name("S"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|shape| shape.as_str() == name)
    }

    /// The shape drawn at the top-left corner of the grid.
    #[must_use]
    pub const fn canonical_image(self) -> BinaryImage {
        CANONICAL_IMAGES[self.index()]
    }

    /// Number of cells covered by the shape (1-4).
    #[must_use]
    pub const fn level(self) -> u32 {
        self.canonical_image().count_filled()
    }

    /// Shapes with the given level, in table order.
    pub fn shapes_of_level(level: u32) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |shape| shape.level() == level)
    }

    /// Distinct orientations of the shape, each moved to the top-left corner.
    #[must_use]
    pub fn base_configurations(self) -> &'static [BinaryImage] {
        &BASE_CONFIGURATIONS[self.index()]
    }

    /// Checks if `image` is this shape in some orientation, anywhere on the grid.
    #[must_use]
    pub fn matches(self, image: BinaryImage) -> bool {
        let normalized = image.move_to_top_left();
        self.base_configurations().contains(&normalized)
    }

    /// Every distinct way the shape can sit on an empty 5×5 grid.
    ///
    /// Computed on first use per shape and kept for the process lifetime.
    #[must_use]
    pub fn all_placements(self) -> &'static [BinaryImage] {
        PLACEMENTS[self.index()].get_or_init(|| compute_placements(self))
    }

    /// Shapes a player may exchange `self` for, given the current reserve.
    ///
    /// A shape can be exchanged for a different shape of the same level, or for any
    /// shape of the next *available* higher level: the lowest level above
    /// `self.level()` that has at least one shape left in the reserve. Only shapes
    /// with a positive reserve count are returned.
    #[must_use]
    pub fn change_options(self, reserve: &ShapeCounts) -> ShapeList {
        let level = self.level();
        let mut options: ShapeList = Self::shapes_of_level(level)
            .filter(|&shape| shape != self && reserve[shape] > 0)
            .collect();
        options.extend(next_available_level(level, reserve));
        options
    }

    /// Shapes offered as reward for a puzzle whose reward shape is `self`.
    ///
    /// Returns `self` alone when it is still in the reserve. Otherwise returns the
    /// shapes of the lowest higher level with a positive reserve count, or nothing
    /// when no higher level has any shape left.
    #[must_use]
    pub fn reward_options(self, reserve: &ShapeCounts) -> ShapeList {
        if reserve[self] > 0 {
            let mut options = ArrayVec::new();
            options.push(self);
            return options;
        }
        next_available_level(self.level(), reserve).collect()
    }
}

/// Shapes of the lowest level above `level` that has a shape in the reserve.
fn next_available_level(
    level: u32,
    reserve: &ShapeCounts,
) -> impl Iterator<Item = TetrominoShape> + '_ {
    let next_level = (level + 1..=TetrominoShape::MAX_LEVEL)
        .find(|&l| TetrominoShape::shapes_of_level(l).any(|shape| reserve[shape] > 0));
    next_level
        .into_iter()
        .flat_map(TetrominoShape::shapes_of_level)
        .filter(|&shape| reserve[shape] > 0)
}

const CANONICAL_IMAGES: [BinaryImage; TetrominoShape::LEN] = {
    const fn img(cells: &[(usize, usize)]) -> BinaryImage {
        let mut bits = 0;
        let mut i = 0;
        while i < cells.len() {
            let (row, col) = cells[i];
            bits |= 1 << (row * GRID_SIZE + col);
            i += 1;
        }
        BinaryImage::from_bits_truncate(bits)
    }

    [
        // O1: #
        img(&[(0, 0)]),
        // O2: ##
        //     ##
        img(&[(0, 0), (0, 1), (1, 0), (1, 1)]),
        // I2: ##
        img(&[(0, 0), (0, 1)]),
        // I3: ###
        img(&[(0, 0), (0, 1), (0, 2)]),
        // I4: ####
        img(&[(0, 0), (0, 1), (0, 2), (0, 3)]),
        // L2: #.
        //     ##
        img(&[(0, 0), (1, 0), (1, 1)]),
        // L3: #.
        //     #.
        //     ##
        img(&[(0, 0), (1, 0), (2, 0), (2, 1)]),
        // Z:  ##.
        //     .##
        img(&[(0, 0), (0, 1), (1, 1), (1, 2)]),
        // T:  ###
        //     .#.
        img(&[(0, 0), (0, 1), (0, 2), (1, 1)]),
    ]
};

static BASE_CONFIGURATIONS: LazyLock<[ArrayVec<BinaryImage, 8>; TetrominoShape::LEN]> =
    LazyLock::new(|| TetrominoShape::ALL.map(compute_base_configurations));

static PLACEMENTS: [OnceLock<Vec<BinaryImage>>; TetrominoShape::LEN] =
    [const { OnceLock::new() }; TetrominoShape::LEN];

fn compute_base_configurations(shape: TetrominoShape) -> ArrayVec<BinaryImage, 8> {
    let mut configurations = ArrayVec::new();
    for start in [
        shape.canonical_image(),
        shape.canonical_image().flip_horizontal(),
    ] {
        let mut image = start;
        for _ in 0..4 {
            let normalized = image.move_to_top_left();
            if !configurations.contains(&normalized) {
                configurations.push(normalized);
            }
            image = image.rotate_right();
        }
    }
    configurations
}

fn compute_placements(shape: TetrominoShape) -> Vec<BinaryImage> {
    let mut placements = BTreeSet::new();
    for &configuration in shape.base_configurations() {
        let mut row_start = configuration;
        loop {
            let mut image = row_start;
            loop {
                placements.insert(image);
                let moved = image.move_right();
                if moved == image {
                    break;
                }
                image = moved;
            }
            let moved = row_start.move_down();
            if moved == row_start {
                break;
            }
            row_start = moved;
        }
    }
    placements.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(counts: &[(TetrominoShape, u32)]) -> ShapeCounts {
        let mut reserve = ShapeCounts::ZERO;
        for &(shape, count) in counts {
            reserve[shape] = count;
        }
        reserve
    }

    #[test]
    fn test_levels() {
        use TetrominoShape::*;
        assert_eq!(O1.level(), 1);
        assert_eq!(I2.level(), 2);
        assert_eq!(I3.level(), 3);
        assert_eq!(L2.level(), 3);
        for shape in [O2, I4, L3, Z, T] {
            assert_eq!(shape.level(), 4, "{shape} should be level 4");
        }
        assert_eq!(TetrominoShape::shapes_of_level(3).collect::<Vec<_>>(), [I3, L2]);
    }

    #[test]
    fn test_base_configuration_counts() {
        use TetrominoShape::*;
        let expected = [
            (O1, 1),
            (O2, 1),
            (I2, 2),
            (I3, 2),
            (I4, 2),
            (L2, 4),
            (L3, 8),
            (Z, 4),
            (T, 4),
        ];
        for (shape, count) in expected {
            assert_eq!(
                shape.base_configurations().len(),
                count,
                "unexpected orientation count for {shape}"
            );
        }
    }

    #[test]
    fn test_base_configurations_are_normalized() {
        for shape in TetrominoShape::ALL {
            for &configuration in shape.base_configurations() {
                assert_eq!(configuration.move_to_top_left(), configuration);
                assert_eq!(configuration.count_filled(), shape.level());
            }
        }
    }

    #[test]
    fn test_placement_counts() {
        use TetrominoShape::*;
        let expected = [
            (O1, 25),
            (O2, 16),
            (I2, 40),
            (I3, 30),
            (I4, 20),
            (L2, 64),
            (L3, 96),
            (Z, 48),
            (T, 48),
        ];
        for (shape, count) in expected {
            assert_eq!(shape.all_placements().len(), count, "{shape}");
        }
    }

    #[test]
    fn test_all_placements_match_shape() {
        for shape in TetrominoShape::ALL {
            let placements = shape.all_placements();
            assert!(!placements.is_empty());
            for &placement in placements {
                assert!(shape.matches(placement), "{shape} should match\n{placement}");
            }
        }
    }

    #[test]
    fn test_matches_rejects_other_shapes() {
        let z = BinaryImage::from_ascii(
            r"
            .....
            ..#..
            .##..
            .#...
            .....
            ",
        );
        assert!(TetrominoShape::Z.matches(z));
        assert!(!TetrominoShape::T.matches(z));
        assert!(!TetrominoShape::L3.matches(z));
        assert!(!TetrominoShape::O1.matches(BinaryImage::EMPTY));

        // Disconnected cells are never a shape
        let split = BinaryImage::from_ascii(
            r"
            #.#..
            .....
            .....
            .....
            .....
            ",
        );
        assert!(!TetrominoShape::I2.matches(split));
        assert!(!TetrominoShape::I3.matches(split));
    }

    #[test]
    fn test_names() {
        for shape in TetrominoShape::ALL {
            assert_eq!(TetrominoShape::from_name(shape.as_str()), Some(shape));
        }
        assert_eq!(TetrominoShape::from_name("X"), None);
        assert_eq!("Z".parse(), Ok(TetrominoShape::Z));
        assert_eq!(
            "o1".parse::<TetrominoShape>().unwrap_err().to_string(),
            "unknown tetromino shape 'o1'"
        );
    }

    #[test]
    fn test_change_options_same_and_next_level() {
        use TetrominoShape::*;
        let full = ShapeCounts::splat(5);
        assert_eq!(O1.change_options(&full).as_slice(), [I2]);
        assert_eq!(I2.change_options(&full).as_slice(), [I3, L2]);
        assert_eq!(I3.change_options(&full).as_slice(), [L2, O2, I4, L3, Z, T]);
        assert_eq!(T.change_options(&full).as_slice(), [O2, I4, L3, Z]);
    }

    #[test]
    fn test_change_options_skip_empty_levels() {
        use TetrominoShape::*;
        let reserve = reserve(&[(O1, 3), (I4, 1), (Z, 2)]);
        // Level 2 and 3 are exhausted, so level 4 is the next available level
        assert_eq!(O1.change_options(&reserve).as_slice(), [I4, Z]);
        assert!(I4.change_options(&ShapeCounts::ZERO).is_empty());
    }

    #[test]
    fn test_reward_options() {
        use TetrominoShape::*;
        let reserve = reserve(&[(I2, 0), (I3, 2), (L2, 1), (T, 4)]);
        assert_eq!(I2.reward_options(&reserve).as_slice(), [I3, L2]);
        assert_eq!(T.reward_options(&reserve).as_slice(), [T]);
        assert!(Z.reward_options(&reserve).is_empty());
    }

    #[test]
    fn test_reward_options_skip_to_higher_level() {
        use TetrominoShape::*;
        let reserve = reserve(&[(O2, 1), (Z, 3)]);
        assert_eq!(O1.reward_options(&reserve).as_slice(), [O2, Z]);
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&TetrominoShape::L3).unwrap();
        assert_eq!(json, "\"L3\"");
        let shape: TetrominoShape = serde_json::from_str("\"Z\"").unwrap();
        assert_eq!(shape, TetrominoShape::Z);
    }
}

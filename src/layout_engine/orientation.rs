use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Which axis workspace indices advance along first. The discriminants are
/// the `_NET_DESKTOP_LAYOUT` wire values.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumIter
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Orientation {
    #[default]
    Horizontal = 0,
    Vertical = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    /// Row and column step for moving one cell in this direction.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
        }
    }
}

/// The grid cell workspace 0 is placed in.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumIter
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Corner {
    #[default]
    TopLeft = 0,
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
}

impl Corner {
    pub fn is_right(self) -> bool { matches!(self, Corner::TopRight | Corner::BottomRight) }

    pub fn is_bottom(self) -> bool { matches!(self, Corner::BottomLeft | Corner::BottomRight) }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn wire_values_round_trip() {
        assert_eq!(Corner::try_from(2u32), Ok(Corner::BottomRight));
        assert_eq!(u32::from(Corner::BottomLeft), 3);
        assert_eq!(Orientation::try_from(1u32), Ok(Orientation::Vertical));
        assert!(Orientation::try_from(2u32).is_err());
    }
}

//! Map positions and facing directions.

use serde::{Deserialize, Serialize};

/// A position on the active map, in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MapPoint {
    /// X coordinate in tiles
    pub x: f32,
    /// Y coordinate in tiles
    pub y: f32,
}

impl MapPoint {
    /// Creates a new map point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns this point moved one step in `direction`.
    #[must_use]
    pub fn stepped(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx as f32, self.y + dy as f32)
    }

    /// Direction whose step brings this point closest to `other`.
    #[must_use]
    pub fn direction_to(self, other: Self) -> Direction {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let horizontal = if dx.abs() < 0.5 { 0 } else { dx.signum() as i32 };
        let vertical = if dy.abs() < 0.5 { 0 } else { dy.signum() as i32 };
        Direction::from_offset(horizontal, vertical).unwrap_or(Direction::Down)
    }
}

/// Eight-way facing direction. Y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// North
    Up,
    /// South
    Down,
    /// West
    Left,
    /// East
    Right,
    /// North-west
    UpLeft,
    /// North-east
    UpRight,
    /// South-west
    DownLeft,
    /// South-east
    DownRight,
}

impl Direction {
    /// Unit tile offset for one step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::UpLeft => (-1, -1),
            Self::UpRight => (1, -1),
            Self::DownLeft => (-1, 1),
            Self::DownRight => (1, 1),
        }
    }

    /// Direction for a unit offset, `None` for `(0, 0)` or non-unit input.
    #[must_use]
    pub const fn from_offset(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(Self::Up),
            (0, 1) => Some(Self::Down),
            (-1, 0) => Some(Self::Left),
            (1, 0) => Some(Self::Right),
            (-1, -1) => Some(Self::UpLeft),
            (1, -1) => Some(Self::UpRight),
            (-1, 1) => Some(Self::DownLeft),
            (1, 1) => Some(Self::DownRight),
            _ => None,
        }
    }

    /// The opposite direction (used for backstep dodges).
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::UpLeft => Self::DownRight,
            Self::UpRight => Self::DownLeft,
            Self::DownLeft => Self::UpRight,
            Self::DownRight => Self::UpLeft,
        }
    }
}

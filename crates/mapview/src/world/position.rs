use std::f64::consts::PI;

/// Highest floor index. Floor 0 is the topmost layer of the world.
pub const MAX_Z: u8 = 15;

const MAX_COORD: i32 = u16::MAX as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::NorthWest,
    ];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
        }
    }
}

/// World coordinate. `x`/`y` span the `u16` range and `z` is a floor index in
/// `0..=MAX_Z`; every constructor keeps the value inside those bounds, so an
/// out-of-range result surfaces as `None` instead of a sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub fn new(x: u16, y: u16, z: u8) -> Option<Self> {
        (z <= MAX_Z).then_some(Self { x, y, z })
    }

    pub fn from_coords(x: i32, y: i32, z: i32) -> Option<Self> {
        if !(0..=MAX_COORD).contains(&x)
            || !(0..=MAX_COORD).contains(&y)
            || !(0..=MAX_Z as i32).contains(&z)
        {
            return None;
        }
        Some(Self {
            x: x as u16,
            y: y as u16,
            z: z as u8,
        })
    }

    pub fn translated(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Self::from_coords(
            self.x as i32 + dx,
            self.y as i32 + dy,
            self.z as i32 + dz,
        )
    }

    /// Moves `floors` floors up while keeping the same on-screen location.
    /// A negative count moves down.
    pub fn covered_up(self, floors: i32) -> Option<Self> {
        self.translated(floors, floors, -floors)
    }

    pub fn covered_down(self, floors: i32) -> Option<Self> {
        self.translated(-floors, -floors, floors)
    }

    pub fn up(self, floors: i32) -> Option<Self> {
        self.translated(0, 0, -floors)
    }

    pub fn down(self, floors: i32) -> Option<Self> {
        self.translated(0, 0, floors)
    }

    pub fn translated_to_direction(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.offset();
        self.translated(dx, dy, 0)
    }

    /// Planar euclidean distance; floors are ignored.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = other.x as f64 - self.x as f64;
        let dy = other.y as f64 - self.y as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Compass direction from `self` towards `to`, in 45 degree sectors.
    /// `None` when both share the same x/y.
    pub fn direction_to(&self, to: &Position) -> Option<Direction> {
        let dx = to.x as f64 - self.x as f64;
        let dy = to.y as f64 - self.y as f64;
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let mut angle = (-dy).atan2(dx);
        if angle < 0.0 {
            angle += 2.0 * PI;
        }
        let degrees = angle.to_degrees();
        let direction = if !(22.5..360.0 - 22.5).contains(&degrees) {
            Direction::East
        } else if degrees < 67.5 {
            Direction::NorthEast
        } else if degrees < 112.5 {
            Direction::North
        } else if degrees < 157.5 {
            Direction::NorthWest
        } else if degrees < 202.5 {
            Direction::West
        } else if degrees < 247.5 {
            Direction::SouthWest
        } else if degrees < 292.5 {
            Direction::South
        } else {
            Direction::SouthEast
        };
        Some(direction)
    }

    pub fn is_in_range(&self, other: &Position, x_range: i32, y_range: i32, ignore_z: bool) -> bool {
        self.is_in_range_ex(other, x_range, x_range, y_range, y_range, ignore_z)
    }

    /// `other` lies within `[self.x - min_x, self.x + max_x]` and
    /// `[self.y - min_y, self.y + max_y]`.
    pub fn is_in_range_ex(
        &self,
        other: &Position,
        min_x: i32,
        max_x: i32,
        min_y: i32,
        max_y: i32,
        ignore_z: bool,
    ) -> bool {
        let (x, y) = (self.x as i32, self.y as i32);
        let (ox, oy) = (other.x as i32, other.y as i32);
        ox >= x - min_x
            && ox <= x + max_x
            && oy >= y - min_y
            && oy <= y + max_y
            && (ignore_z || other.z == self.z)
    }
}

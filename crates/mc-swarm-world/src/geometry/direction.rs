//! Block faces, axes and axis permutations.

use std::fmt;

use mc_swarm_proto::types::BlockPos;

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const VALUES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn choose<T>(self, x: T, y: T, z: T) -> T {
        match self {
            Axis::X => x,
            Axis::Y => y,
            Axis::Z => z,
        }
    }

    pub fn positive(self) -> Direction {
        match self {
            Axis::X => Direction::East,
            Axis::Y => Direction::Up,
            Axis::Z => Direction::South,
        }
    }

    pub fn negative(self) -> Direction {
        match self {
            Axis::X => Direction::West,
            Axis::Y => Direction::Down,
            Axis::Z => Direction::North,
        }
    }

    pub fn is_vertical(self) -> bool {
        self == Axis::Y
    }

    pub fn is_horizontal(self) -> bool {
        !self.is_vertical()
    }

    pub fn name(self) -> &'static str {
        self.choose("x", "y", "z")
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisDirection {
    Positive,
    Negative,
}

impl AxisDirection {
    pub fn step(self) -> i32 {
        match self {
            AxisDirection::Positive => 1,
            AxisDirection::Negative => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            AxisDirection::Positive => AxisDirection::Negative,
            AxisDirection::Negative => AxisDirection::Positive,
        }
    }
}

// ---------------------------------------------------------------------------
// AxisCycle
// ---------------------------------------------------------------------------

/// Cyclic relabelling of the three axes. Lets one sweep routine written for
/// the X axis serve Y and Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisCycle {
    None,
    Forward,
    Backward,
}

impl AxisCycle {
    const VALUES: [AxisCycle; 3] = [AxisCycle::None, AxisCycle::Forward, AxisCycle::Backward];

    /// Cycle that maps `from` onto `to`.
    pub fn between(from: Axis, to: Axis) -> Self {
        let diff = (to.ordinal() as i32 - from.ordinal() as i32).rem_euclid(3);
        Self::VALUES[diff as usize]
    }

    pub fn inverse(self) -> Self {
        match self {
            AxisCycle::None => AxisCycle::None,
            AxisCycle::Forward => AxisCycle::Backward,
            AxisCycle::Backward => AxisCycle::Forward,
        }
    }

    pub fn cycle_axis(self, axis: Axis) -> Axis {
        match self {
            AxisCycle::None => axis,
            AxisCycle::Forward => Axis::VALUES[(axis.ordinal() + 1) % 3],
            AxisCycle::Backward => Axis::VALUES[(axis.ordinal() + 2) % 3],
        }
    }

    /// Pick the component that lands on `axis` after cycling `(x, y, z)`.
    pub fn cycle<T>(self, x: T, y: T, z: T, axis: Axis) -> T {
        match self {
            AxisCycle::None => axis.choose(x, y, z),
            AxisCycle::Forward => axis.choose(z, x, y),
            AxisCycle::Backward => axis.choose(y, z, x),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the six block faces. Discriminants are the 3D data values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down = 0,
    Up = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl Direction {
    pub const VALUES: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Horizontal directions ordered by 2D data value.
    const BY_2D: [Direction; 4] = [
        Direction::South,
        Direction::West,
        Direction::North,
        Direction::East,
    ];

    pub fn data_3d(self) -> i32 {
        self as i32
    }

    /// Horizontal index (south 0, west 1, north 2, east 3), -1 for vertical.
    pub fn data_2d(self) -> i32 {
        match self {
            Direction::South => 0,
            Direction::West => 1,
            Direction::North => 2,
            Direction::East => 3,
            Direction::Down | Direction::Up => -1,
        }
    }

    pub fn from_3d_data(value: i32) -> Self {
        Self::VALUES[(value % 6).unsigned_abs() as usize]
    }

    pub fn from_2d_data(value: i32) -> Self {
        Self::BY_2D[(value % 4).unsigned_abs() as usize]
    }

    /// Horizontal direction a yaw angle (degrees) faces.
    pub fn from_yaw(yaw: f64) -> Self {
        Self::from_2d_data((yaw / 90.0 + 0.5).floor() as i32 & 3)
    }

    pub fn from_axis(axis: Axis, dir: AxisDirection) -> Self {
        match dir {
            AxisDirection::Positive => axis.positive(),
            AxisDirection::Negative => axis.negative(),
        }
    }

    /// Direction whose normal best matches the vector. North when every
    /// projection is non-positive.
    pub fn nearest(x: f64, y: f64, z: f64) -> Self {
        let (x, y, z) = (x as f32, y as f32, z as f32);
        let mut best = Direction::North;
        // smallest positive float, so zero projections never win
        let mut best_dot = f32::from_bits(1);
        for dir in Self::VALUES {
            let [nx, ny, nz] = dir.normal();
            let dot = x * nx as f32 + y * ny as f32 + z * nz as f32;
            if dot > best_dot {
                best_dot = dot;
                best = dir;
            }
        }
        best
    }

    /// Dominant axis of an integer offset, or `fallback` on ties.
    pub fn nearest_int(x: i32, y: i32, z: i32, fallback: Option<Direction>) -> Option<Direction> {
        let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
        if ax > az && ax > ay {
            Some(if x < 0 { Direction::West } else { Direction::East })
        } else if az > ax && az > ay {
            Some(if z < 0 { Direction::North } else { Direction::South })
        } else if ay > ax && ay > az {
            Some(if y < 0 { Direction::Down } else { Direction::Up })
        } else {
            fallback
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::Down | Direction::Up => Axis::Y,
            Direction::North | Direction::South => Axis::Z,
            Direction::West | Direction::East => Axis::X,
        }
    }

    pub fn axis_direction(self) -> AxisDirection {
        match self {
            Direction::Up | Direction::South | Direction::East => AxisDirection::Positive,
            Direction::Down | Direction::North | Direction::West => AxisDirection::Negative,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    pub fn normal(self) -> [i32; 3] {
        match self {
            Direction::Down => [0, -1, 0],
            Direction::Up => [0, 1, 0],
            Direction::North => [0, 0, -1],
            Direction::South => [0, 0, 1],
            Direction::West => [-1, 0, 0],
            Direction::East => [1, 0, 0],
        }
    }

    pub fn step_x(self) -> i32 {
        self.normal()[0]
    }

    pub fn step_y(self) -> i32 {
        self.normal()[1]
    }

    pub fn step_z(self) -> i32 {
        self.normal()[2]
    }

    pub fn relative(self, pos: BlockPos) -> BlockPos {
        let [x, y, z] = self.normal();
        pos.offset(x, y, z)
    }

    /// Yaw in degrees this horizontal direction faces. Vertical directions
    /// have no yaw.
    pub fn to_yaw(self) -> Option<f32> {
        match self {
            Direction::North => Some(180.0),
            Direction::South => Some(0.0),
            Direction::West => Some(90.0),
            Direction::East => Some(-90.0),
            Direction::Down | Direction::Up => None,
        }
    }

    /// Rotate clockwise around the Y axis. Vertical directions are unchanged.
    pub fn clockwise(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            other => other,
        }
    }

    pub fn counter_clockwise(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            other => other,
        }
    }

    /// Rotate clockwise around `axis`; directions on that axis are unchanged.
    pub fn clockwise_around(self, axis: Axis) -> Self {
        if self.axis() == axis {
            return self;
        }
        match axis {
            Axis::Y => self.clockwise(),
            Axis::X => match self {
                Direction::Down => Direction::South,
                Direction::South => Direction::Up,
                Direction::Up => Direction::North,
                Direction::North => Direction::Down,
                other => other,
            },
            Axis::Z => match self {
                Direction::Down => Direction::West,
                Direction::West => Direction::Up,
                Direction::Up => Direction::East,
                Direction::East => Direction::Down,
                other => other,
            },
        }
    }

    pub fn counter_clockwise_around(self, axis: Axis) -> Self {
        // three clockwise quarter turns
        self.clockwise_around(axis)
            .clockwise_around(axis)
            .clockwise_around(axis)
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_values() {
        for (i, dir) in Direction::VALUES.iter().enumerate() {
            assert_eq!(dir.data_3d(), i as i32);
            assert_eq!(Direction::from_3d_data(i as i32), *dir);
        }
        assert_eq!(Direction::from_2d_data(2), Direction::North);
        assert_eq!(Direction::from_3d_data(-7), Direction::Up);
    }

    #[test]
    fn opposites_and_axes() {
        for dir in Direction::VALUES {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.opposite().axis(), dir.axis());
            assert_ne!(dir.opposite().axis_direction(), dir.axis_direction());
            assert_eq!(Direction::from_axis(dir.axis(), dir.axis_direction()), dir);
        }
    }

    #[test]
    fn yaw_mapping() {
        assert_eq!(Direction::from_yaw(0.0), Direction::South);
        assert_eq!(Direction::from_yaw(90.0), Direction::West);
        assert_eq!(Direction::from_yaw(180.0), Direction::North);
        assert_eq!(Direction::from_yaw(-90.0), Direction::East);
        assert_eq!(Direction::from_yaw(44.0), Direction::South);
        assert_eq!(Direction::North.to_yaw(), Some(180.0));
        assert_eq!(Direction::Up.to_yaw(), None);
    }

    #[test]
    fn rotations() {
        assert_eq!(Direction::North.clockwise(), Direction::East);
        assert_eq!(Direction::North.counter_clockwise(), Direction::West);
        assert_eq!(Direction::Down.clockwise_around(Axis::X), Direction::South);
        assert_eq!(Direction::Down.counter_clockwise_around(Axis::X), Direction::North);
        assert_eq!(Direction::Up.counter_clockwise_around(Axis::Z), Direction::West);
        assert_eq!(Direction::East.clockwise_around(Axis::X), Direction::East);
    }

    #[test]
    fn nearest() {
        assert_eq!(Direction::nearest(0.2, -0.9, 0.1), Direction::Down);
        assert_eq!(Direction::nearest(0.0, 0.0, 0.0), Direction::North);
        assert_eq!(Direction::nearest_int(3, 1, -2, None), Some(Direction::East));
        assert_eq!(Direction::nearest_int(1, 1, 0, None), None);
    }

    #[test]
    fn axis_cycle() {
        assert_eq!(AxisCycle::between(Axis::Y, Axis::X), AxisCycle::Backward);
        assert_eq!(AxisCycle::between(Axis::X, Axis::Y), AxisCycle::Forward);
        assert_eq!(AxisCycle::between(Axis::Z, Axis::Z), AxisCycle::None);
        for c in [AxisCycle::None, AxisCycle::Forward, AxisCycle::Backward] {
            for axis in Axis::VALUES {
                assert_eq!(c.inverse().cycle_axis(c.cycle_axis(axis)), axis);
            }
        }
        assert_eq!(AxisCycle::Forward.cycle(1, 2, 3, Axis::X), 3);
        assert_eq!(AxisCycle::Backward.cycle(1, 2, 3, Axis::X), 2);
    }
}

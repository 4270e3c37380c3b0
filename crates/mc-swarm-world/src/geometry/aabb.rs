//! Axis-aligned bounding boxes.

use std::fmt;

use mc_swarm_proto::types::BlockPos;

use super::direction::{Axis, Direction};
use super::shape::CollisionGrid;
use super::vec3::{lerp, Vec3};

/// Tolerance used by clipping and collision sweeps.
pub const EPSILON: f64 = 1.0e-7;

/// Box with `min <= max` on every axis. Constructors sort their inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

/// Result of a ray hitting a block shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockHitResult {
    pub location: Vec3,
    pub direction: Direction,
    pub block_pos: BlockPos,
    pub inside: bool,
}

impl AABB {
    pub fn new(x1: f64, y1: f64, z1: f64, x2: f64, y2: f64, z2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            min_z: z1.min(z2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
            max_z: z1.max(z2),
        }
    }

    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Self::new(a.x, a.y, a.z, b.x, b.y, b.z)
    }

    /// Unit cube occupying a block.
    pub fn of_block(pos: BlockPos) -> Self {
        Self::unit_cube_from_lower_corner(Vec3::at_lower_corner_of(pos))
    }

    pub fn unit_cube_from_lower_corner(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z, v.x + 1.0, v.y + 1.0, v.z + 1.0)
    }

    /// Smallest box covering every block between two positions, inclusive.
    pub fn encapsulating_full_blocks(a: BlockPos, b: BlockPos) -> Self {
        Self::new(
            a.x.min(b.x) as f64,
            a.y.min(b.y) as f64,
            a.z.min(b.z) as f64,
            (a.x.max(b.x) + 1) as f64,
            (a.y.max(b.y) + 1) as f64,
            (a.z.max(b.z) + 1) as f64,
        )
    }

    pub fn of_size(center: Vec3, x_size: f64, y_size: f64, z_size: f64) -> Self {
        Self::new(
            center.x - x_size / 2.0,
            center.y - y_size / 2.0,
            center.z - z_size / 2.0,
            center.x + x_size / 2.0,
            center.y + y_size / 2.0,
            center.z + z_size / 2.0,
        )
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn min(&self, axis: Axis) -> f64 {
        axis.choose(self.min_x, self.min_y, self.min_z)
    }

    pub fn max(&self, axis: Axis) -> f64 {
        axis.choose(self.max_x, self.max_y, self.max_z)
    }

    pub fn x_size(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn y_size(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn z_size(&self) -> f64 {
        self.max_z - self.min_z
    }

    /// Mean edge length.
    pub fn size(&self) -> f64 {
        (self.x_size() + self.y_size() + self.z_size()) / 3.0
    }

    pub fn min_xz(&self) -> f64 {
        self.x_size().min(self.z_size())
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            lerp(0.5, self.min_x, self.max_x),
            lerp(0.5, self.min_y, self.max_y),
            lerp(0.5, self.min_z, self.max_z),
        )
    }

    pub fn bottom_center(&self) -> Vec3 {
        Vec3::new(
            lerp(0.5, self.min_x, self.max_x),
            self.min_y,
            lerp(0.5, self.min_z, self.max_z),
        )
    }

    pub fn min_position(&self) -> Vec3 {
        Vec3::new(self.min_x, self.min_y, self.min_z)
    }

    pub fn max_position(&self) -> Vec3 {
        Vec3::new(self.max_x, self.max_y, self.max_z)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y || self.min_z >= self.max_z
    }

    pub fn has_nan(&self) -> bool {
        [
            self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z,
        ]
        .iter()
        .any(|v| v.is_nan())
    }

    /// Exactly the unit cube at the origin.
    pub fn is_full_block(&self) -> bool {
        self.is_full_block_xz() && self.min_y == 0.0 && self.max_y == 1.0
    }

    pub fn is_full_block_xz(&self) -> bool {
        self.min_x == 0.0 && self.min_z == 0.0 && self.max_x == 1.0 && self.max_z == 1.0
    }

    // -----------------------------------------------------------------------
    // Derived boxes
    // -----------------------------------------------------------------------

    pub fn with_min_x(&self, v: f64) -> Self {
        Self::new(v, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z)
    }

    pub fn with_min_y(&self, v: f64) -> Self {
        Self::new(self.min_x, v, self.min_z, self.max_x, self.max_y, self.max_z)
    }

    pub fn with_min_z(&self, v: f64) -> Self {
        Self::new(self.min_x, self.min_y, v, self.max_x, self.max_y, self.max_z)
    }

    pub fn with_max_x(&self, v: f64) -> Self {
        Self::new(self.min_x, self.min_y, self.min_z, v, self.max_y, self.max_z)
    }

    pub fn with_max_y(&self, v: f64) -> Self {
        Self::new(self.min_x, self.min_y, self.min_z, self.max_x, v, self.max_z)
    }

    pub fn with_max_z(&self, v: f64) -> Self {
        Self::new(self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, v)
    }

    /// Shrink from the side the vector points to.
    pub fn contract(&self, x: f64, y: f64, z: f64) -> Self {
        let (mut a, mut b) = (self.min_position(), self.max_position());
        if x < 0.0 {
            a.x -= x;
        } else if x > 0.0 {
            b.x -= x;
        }
        if y < 0.0 {
            a.y -= y;
        } else if y > 0.0 {
            b.y -= y;
        }
        if z < 0.0 {
            a.z -= z;
        } else if z > 0.0 {
            b.z -= z;
        }
        Self::from_corners(a, b)
    }

    /// Grow towards the side the vector points to.
    pub fn expand_towards(&self, x: f64, y: f64, z: f64) -> Self {
        let (mut a, mut b) = (self.min_position(), self.max_position());
        if x < 0.0 {
            a.x += x;
        } else if x > 0.0 {
            b.x += x;
        }
        if y < 0.0 {
            a.y += y;
        } else if y > 0.0 {
            b.y += y;
        }
        if z < 0.0 {
            a.z += z;
        } else if z > 0.0 {
            b.z += z;
        }
        Self::from_corners(a, b)
    }

    pub fn inflate(&self, x: f64, y: f64, z: f64) -> Self {
        Self::new(
            self.min_x - x,
            self.min_y - y,
            self.min_z - z,
            self.max_x + x,
            self.max_y + y,
            self.max_z + z,
        )
    }

    pub fn inflate_all(&self, v: f64) -> Self {
        self.inflate(v, v, v)
    }

    pub fn deflate(&self, x: f64, y: f64, z: f64) -> Self {
        self.inflate(-x, -y, -z)
    }

    pub fn deflate_all(&self, v: f64) -> Self {
        self.inflate_all(-v)
    }

    pub fn intersect(&self, other: &AABB) -> Self {
        Self::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.min_z.max(other.min_z),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
            self.max_z.min(other.max_z),
        )
    }

    /// Union bounding box.
    pub fn minmax(&self, other: &AABB) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.min_z.min(other.min_z),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
            self.max_z.max(other.max_z),
        )
    }

    pub fn move_by(&self, x: f64, y: f64, z: f64) -> Self {
        Self::new(
            self.min_x + x,
            self.min_y + y,
            self.min_z + z,
            self.max_x + x,
            self.max_y + y,
            self.max_z + z,
        )
    }

    pub fn move_to_block(&self, pos: BlockPos) -> Self {
        self.move_by(pos.x as f64, pos.y as f64, pos.z as f64)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Strict overlap; touching faces do not intersect.
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
            && self.min_z < other.max_z
            && self.max_z > other.min_z
    }

    /// Half-open containment: min inclusive, max exclusive.
    pub fn contains(&self, v: Vec3) -> bool {
        v.x >= self.min_x
            && v.x < self.max_x
            && v.y >= self.min_y
            && v.y < self.max_y
            && v.z >= self.min_z
            && v.z < self.max_z
    }

    pub fn distance_to_sqr(&self, v: Vec3) -> f64 {
        let dx = (self.min_x - v.x).max(v.x - self.max_x).max(0.0);
        let dy = (self.min_y - v.y).max(v.y - self.max_y).max(0.0);
        let dz = (self.min_z - v.z).max(v.z - self.max_z).max(0.0);
        dx * dx + dy * dy + dz * dz
    }

    /// First point where the segment `from -> to` enters this box.
    pub fn clip(&self, from: Vec3, to: Vec3) -> Option<Vec3> {
        let delta = to - from;
        let mut min_distance = 1.0;
        self.clip_direction(from, &mut min_distance, None, delta)?;
        Some(from + delta * min_distance)
    }

    /// Nearest entry point of the segment across several absolute boxes,
    /// with the face that was hit.
    pub fn clip_boxes<'a>(
        boxes: impl IntoIterator<Item = &'a AABB>,
        from: Vec3,
        to: Vec3,
        pos: BlockPos,
    ) -> Option<BlockHitResult> {
        let delta = to - from;
        let mut min_distance = 1.0;
        let mut direction = None;
        for b in boxes {
            direction = b.clip_direction(from, &mut min_distance, direction, delta);
        }
        direction.map(|direction| BlockHitResult {
            location: from + delta * min_distance,
            direction,
            block_pos: pos,
            inside: false,
        })
    }

    fn clip_direction(
        &self,
        start: Vec3,
        min_distance: &mut f64,
        mut facing: Option<Direction>,
        d: Vec3,
    ) -> Option<Direction> {
        // Moving towards +X enters through the west face, and so on.
        if d.x > EPSILON {
            facing = clip_point(
                min_distance, facing, [d.x, d.y, d.z], self.min_x,
                [self.min_y, self.max_y, self.min_z, self.max_z],
                Direction::West, [start.x, start.y, start.z],
            );
        } else if d.x < -EPSILON {
            facing = clip_point(
                min_distance, facing, [d.x, d.y, d.z], self.max_x,
                [self.min_y, self.max_y, self.min_z, self.max_z],
                Direction::East, [start.x, start.y, start.z],
            );
        }
        if d.y > EPSILON {
            facing = clip_point(
                min_distance, facing, [d.y, d.z, d.x], self.min_y,
                [self.min_z, self.max_z, self.min_x, self.max_x],
                Direction::Down, [start.y, start.z, start.x],
            );
        } else if d.y < -EPSILON {
            facing = clip_point(
                min_distance, facing, [d.y, d.z, d.x], self.max_y,
                [self.min_z, self.max_z, self.min_x, self.max_x],
                Direction::Up, [start.y, start.z, start.x],
            );
        }
        if d.z > EPSILON {
            facing = clip_point(
                min_distance, facing, [d.z, d.x, d.y], self.min_z,
                [self.min_x, self.max_x, self.min_y, self.max_y],
                Direction::North, [start.z, start.x, start.y],
            );
        } else if d.z < -EPSILON {
            facing = clip_point(
                min_distance, facing, [d.z, d.x, d.y], self.max_z,
                [self.min_x, self.max_x, self.min_y, self.max_y],
                Direction::South, [start.z, start.x, start.y],
            );
        }
        facing
    }

    /// Whether this box, moved along `motion`, would touch any of `boxes`.
    pub fn collided_along_vector(&self, motion: Vec3, boxes: &[AABB]) -> bool {
        let from = self.center();
        let to = from + motion;
        boxes.iter().any(|b| {
            let grown = b.inflate(self.x_size() * 0.5, self.y_size() * 0.5, self.z_size() * 0.5);
            grown.contains(to) || grown.contains(from) || grown.clip(from, to).is_some()
        })
    }

    /// How far `moving` may travel along `axis` (up to `offset`) before it
    /// hits this box.
    pub fn collide(&self, axis: Axis, moving: &AABB, offset: f64) -> f64 {
        CollisionGrid::collide(self, axis, moving, offset)
    }
}

/// Test one face plane. `d` and `start` are ordered (side, other_a, other_b);
/// `bounds` holds (min_a, max_a, min_b, max_b).
#[allow(clippy::too_many_arguments)]
fn clip_point(
    min_distance: &mut f64,
    prev: Option<Direction>,
    d: [f64; 3],
    side: f64,
    bounds: [f64; 4],
    hit: Direction,
    start: [f64; 3],
) -> Option<Direction> {
    let t = (side - start[0]) / d[0];
    let a = start[1] + t * d[1];
    let b = start[2] + t * d[2];
    if 0.0 < t
        && t < *min_distance
        && bounds[0] - EPSILON < a
        && a < bounds[1] + EPSILON
        && bounds[2] - EPSILON < b
        && b < bounds[3] + EPSILON
    {
        *min_distance = t;
        Some(hit)
    } else {
        prev
    }
}

/// A single box is a 1x1x1 grid whose only cell is full.
impl CollisionGrid for AABB {
    fn cells(&self, _axis: Axis) -> usize {
        1
    }

    fn coord(&self, axis: Axis, index: usize) -> f64 {
        if index == 0 {
            self.min(axis)
        } else {
            self.max(axis)
        }
    }

    fn is_full(&self, x: usize, y: usize, z: usize) -> bool {
        x == 0 && y == 0 && z == 0
    }

    fn is_empty_grid(&self) -> bool {
        self.is_empty()
    }
}

impl fmt::Display for AABB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AABB[{}, {}, {}] -> [{}, {}, {}]",
            self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> AABB {
        AABB::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0)
    }

    #[test]
    fn constructor_normalizes() {
        let b = AABB::new(1.0, 5.0, -1.0, 0.0, 2.0, 3.0);
        assert_eq!(b, AABB::new(0.0, 2.0, -1.0, 1.0, 5.0, 3.0));
        assert!(b.min_x <= b.max_x && b.min_y <= b.max_y && b.min_z <= b.max_z);
    }

    #[test]
    fn clip_hits_west_face() {
        let hit = AABB::clip_boxes(
            [unit()].iter(),
            Vec3::new(-1.0, 0.5, 0.5),
            Vec3::new(2.0, 0.5, 0.5),
            BlockPos::new(0, 0, 0),
        )
        .unwrap();
        assert!(hit.location.distance_to_sqr(Vec3::new(0.0, 0.5, 0.5)) < 1e-20);
        assert_eq!(hit.direction, Direction::West);
        assert!(!hit.inside);
    }

    #[test]
    fn clip_faces_per_direction() {
        let b = unit();
        let cases = [
            (Vec3::new(2.0, 0.5, 0.5), Vec3::new(-1.0, 0.5, 0.5), Direction::East),
            (Vec3::new(0.5, -1.0, 0.5), Vec3::new(0.5, 2.0, 0.5), Direction::Down),
            (Vec3::new(0.5, 2.0, 0.5), Vec3::new(0.5, -1.0, 0.5), Direction::Up),
            (Vec3::new(0.5, 0.5, -1.0), Vec3::new(0.5, 0.5, 2.0), Direction::North),
            (Vec3::new(0.5, 0.5, 2.0), Vec3::new(0.5, 0.5, -1.0), Direction::South),
        ];
        for (from, to, expected) in cases {
            let hit = AABB::clip_boxes([b].iter(), from, to, BlockPos::default()).unwrap();
            assert_eq!(hit.direction, expected);
        }
    }

    #[test]
    fn clip_miss_and_short_segment() {
        let b = unit();
        assert!(b.clip(Vec3::new(-1.0, 2.0, 0.5), Vec3::new(2.0, 2.0, 0.5)).is_none());
        assert!(b.clip(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(-0.5, 0.5, 0.5)).is_none());
        let hit = b.clip(Vec3::new(0.5, 3.0, 0.5), Vec3::new(0.5, -3.0, 0.5)).unwrap();
        assert!((hit.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clip_picks_nearest_box() {
        let near = unit();
        let far = unit().move_by(3.0, 0.0, 0.0);
        let hit = AABB::clip_boxes(
            [far, near].iter(),
            Vec3::new(-1.0, 0.5, 0.5),
            Vec3::new(5.0, 0.5, 0.5),
            BlockPos::default(),
        )
        .unwrap();
        assert!(hit.location.x.abs() < 1e-12);
    }

    #[test]
    fn expand_and_contract() {
        let b = unit().expand_towards(-2.0, 0.0, 3.0);
        assert_eq!(b, AABB::new(-2.0, 0.0, 0.0, 1.0, 1.0, 4.0));
        assert_eq!(b.contract(-2.0, 0.0, 3.0), unit());
        assert_eq!(unit().inflate_all(0.5).deflate_all(0.5), unit());
    }

    #[test]
    fn intersects_is_strict() {
        let a = unit();
        assert!(!a.intersects(&a.move_by(1.0, 0.0, 0.0)));
        assert!(a.intersects(&a.move_by(0.5, 0.5, 0.5)));
        assert!(a.contains(Vec3::new(0.0, 0.0, 0.0)));
        assert!(!a.contains(Vec3::new(1.0, 0.5, 0.5)));
    }

    #[test]
    fn distance_and_centres() {
        let a = unit();
        assert_eq!(a.distance_to_sqr(Vec3::new(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(a.distance_to_sqr(Vec3::new(3.0, 0.5, 2.0)), 5.0);
        assert_eq!(a.center(), Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(a.bottom_center(), Vec3::new(0.5, 0.0, 0.5));
        assert!(a.is_full_block());
    }

    #[test]
    fn encapsulating_blocks() {
        let b = AABB::encapsulating_full_blocks(BlockPos::new(2, 0, -1), BlockPos::new(0, 3, 1));
        assert_eq!(b, AABB::new(0.0, 0.0, -1.0, 3.0, 4.0, 2.0));
    }

    #[test]
    fn collide_stops_at_face() {
        let block = unit();
        let player = AABB::new(0.2, 1.5, 0.2, 0.8, 3.3, 0.8);
        assert_eq!(block.collide(Axis::Y, &player, -1.0), -0.5);
        assert_eq!(block.collide(Axis::Y, &player, 2.0), 2.0);
        assert_eq!(block.collide(Axis::Y, &player, 5.0e-8), 0.0);

        let side = AABB::new(-1.0, 0.2, 0.2, -0.4, 0.8, 0.8);
        assert!((block.collide(Axis::X, &side, 1.0) - 0.4).abs() < 1e-12);
        // not overlapping on the other axes: free movement
        let above = side.move_by(0.0, 2.0, 0.0);
        assert_eq!(block.collide(Axis::X, &above, 1.0), 1.0);
    }

    #[test]
    fn collided_along_vector() {
        let mover = AABB::new(-2.0, 0.0, 0.0, -1.5, 0.5, 0.5);
        assert!(mover.collided_along_vector(Vec3::new(2.0, 0.0, 0.0), &[unit()]));
        assert!(!mover.collided_along_vector(Vec3::new(0.0, 2.0, 0.0), &[unit()]));
    }

    #[test]
    fn nan_detection() {
        assert!(AABB::new(f64::NAN, 0.0, 0.0, 1.0, 1.0, 1.0).has_nan());
        assert!(!unit().has_nan());
    }
}

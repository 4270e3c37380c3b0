//! Voxel collision grids.
//!
//! A shape is a grid of cells over sorted coordinate lists per axis; each
//! cell is either full or empty. Sweeping a moving box against a grid walks
//! the cells along the movement axis and stops at the first full one.

use super::aabb::{AABB, EPSILON};
use super::direction::{Axis, AxisCycle};

pub trait CollisionGrid {
    /// Number of cells along `axis`.
    fn cells(&self, axis: Axis) -> usize;

    /// Boundary `index` along `axis`, for `index` in `0..=cells(axis)`.
    fn coord(&self, axis: Axis, index: usize) -> f64;

    fn is_full(&self, x: usize, y: usize, z: usize) -> bool;

    fn is_empty_grid(&self) -> bool;

    /// Cell containing `pos`, or -1 below the first boundary.
    fn find_index(&self, axis: Axis, pos: f64) -> i64 {
        let size = self.cells(axis) + 1;
        let first_above = (0..size)
            .find(|&i| pos < self.coord(axis, i))
            .unwrap_or(size);
        first_above as i64 - 1
    }

    /// Full test with the coordinates given on the permuted axes.
    fn is_full_cycled(&self, cycle: AxisCycle, x: i64, y: i64, z: i64) -> bool {
        self.is_full_wide(
            cycle.cycle(x, y, z, Axis::X),
            cycle.cycle(x, y, z, Axis::Y),
            cycle.cycle(x, y, z, Axis::Z),
        )
    }

    /// Bounds-checked full test.
    fn is_full_wide(&self, x: i64, y: i64, z: i64) -> bool {
        let inside = |v: i64, axis: Axis| v >= 0 && (v as usize) < self.cells(axis);
        inside(x, Axis::X)
            && inside(y, Axis::Y)
            && inside(z, Axis::Z)
            && self.is_full(x as usize, y as usize, z as usize)
    }

    /// Clamp `offset` so `moving` stops at the first full cell along `axis`.
    fn collide(&self, axis: Axis, moving: &AABB, offset: f64) -> f64 {
        self.collide_cycled(AxisCycle::between(axis, Axis::X), moving, offset)
    }

    fn collide_cycled(&self, cycle: AxisCycle, moving: &AABB, mut offset: f64) -> f64 {
        if self.is_empty_grid() {
            return offset;
        }
        if offset.abs() < EPSILON {
            return 0.0;
        }

        let inverse = cycle.inverse();
        let x_axis = inverse.cycle_axis(Axis::X);
        let y_axis = inverse.cycle_axis(Axis::Y);
        let z_axis = inverse.cycle_axis(Axis::Z);

        let max_x = moving.max(x_axis);
        let min_x = moving.min(x_axis);
        let first_x = self.find_index(x_axis, min_x + EPSILON);
        let last_x = self.find_index(x_axis, max_x - EPSILON);

        let clamp = |v: i64, axis: Axis| v.clamp(0, self.cells(axis) as i64);
        let y0 = clamp(self.find_index(y_axis, moving.min(y_axis) + EPSILON), y_axis);
        let y1 = clamp(self.find_index(y_axis, moving.max(y_axis) - EPSILON) + 1, y_axis);
        let z0 = clamp(self.find_index(z_axis, moving.min(z_axis) + EPSILON), z_axis);
        let z1 = clamp(self.find_index(z_axis, moving.max(z_axis) - EPSILON) + 1, z_axis);
        let end_x = self.cells(x_axis) as i64;

        let blocked = |x: i64| {
            (y0..y1).any(|y| (z0..z1).any(|z| self.is_full_cycled(inverse, x, y, z)))
        };

        if offset > 0.0 {
            for x in (last_x + 1)..end_x {
                if blocked(x) {
                    let gap = self.coord(x_axis, x as usize) - max_x;
                    if gap >= -EPSILON {
                        offset = offset.min(gap);
                    }
                    return offset;
                }
            }
        } else if offset < 0.0 {
            for x in (0..first_x).rev() {
                if blocked(x) {
                    let gap = self.coord(x_axis, x as usize + 1) - min_x;
                    if gap <= EPSILON {
                        offset = offset.max(gap);
                    }
                    return offset;
                }
            }
        }
        offset
    }
}

/// Union of boxes, merged onto one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelShape {
    xs: Vec<f64>,
    ys: Vec<f64>,
    zs: Vec<f64>,
    boxes: Vec<AABB>,
    full: Vec<bool>,
}

impl VoxelShape {
    pub fn empty() -> Self {
        Self {
            xs: vec![0.0],
            ys: vec![0.0],
            zs: vec![0.0],
            boxes: Vec::new(),
            full: Vec::new(),
        }
    }

    pub fn block() -> Self {
        Self::from_boxes(vec![AABB::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0)])
    }

    pub fn from_boxes(boxes: Vec<AABB>) -> Self {
        let boxes: Vec<AABB> = boxes.into_iter().filter(|b| !b.is_empty()).collect();
        if boxes.is_empty() {
            return Self::empty();
        }
        let coords = |axis: Axis| {
            let mut v: Vec<f64> = boxes
                .iter()
                .flat_map(|b| [b.min(axis), b.max(axis)])
                .collect();
            v.sort_by(f64::total_cmp);
            v.dedup();
            v
        };
        let (xs, ys, zs) = (coords(Axis::X), coords(Axis::Y), coords(Axis::Z));
        let (nx, ny, nz) = (xs.len() - 1, ys.len() - 1, zs.len() - 1);

        let mut full = vec![false; nx * ny * nz];
        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let cx = (xs[x] + xs[x + 1]) / 2.0;
                    let cy = (ys[y] + ys[y + 1]) / 2.0;
                    let cz = (zs[z] + zs[z + 1]) / 2.0;
                    full[(x * ny + y) * nz + z] = boxes.iter().any(|b| {
                        b.min_x < cx && cx < b.max_x
                            && b.min_y < cy && cy < b.max_y
                            && b.min_z < cz && cz < b.max_z
                    });
                }
            }
        }
        Self { xs, ys, zs, boxes, full }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn move_by(&self, x: f64, y: f64, z: f64) -> Self {
        let shift = |v: &[f64], d: f64| v.iter().map(|c| c + d).collect();
        Self {
            xs: shift(&self.xs, x),
            ys: shift(&self.ys, y),
            zs: shift(&self.zs, z),
            boxes: self.boxes.iter().map(|b| b.move_by(x, y, z)).collect(),
            full: self.full.clone(),
        }
    }

    /// The boxes this shape was built from.
    pub fn to_boxes(&self) -> &[AABB] {
        &self.boxes
    }

    pub fn bounds(&self) -> Option<AABB> {
        self.boxes.iter().copied().reduce(|a, b| a.minmax(&b))
    }
}

impl CollisionGrid for VoxelShape {
    fn cells(&self, axis: Axis) -> usize {
        axis.choose(&self.xs, &self.ys, &self.zs).len() - 1
    }

    fn coord(&self, axis: Axis, index: usize) -> f64 {
        axis.choose(&self.xs, &self.ys, &self.zs)[index]
    }

    fn is_full(&self, x: usize, y: usize, z: usize) -> bool {
        let (ny, nz) = (self.cells(Axis::Y), self.cells(Axis::Z));
        self.full
            .get((x * ny + y) * nz + z)
            .copied()
            .unwrap_or(false)
    }

    fn is_empty_grid(&self) -> bool {
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_index_bounds() {
        let b = AABB::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        assert_eq!(b.find_index(Axis::X, -0.5), -1);
        assert_eq!(b.find_index(Axis::X, 0.5), 0);
        assert_eq!(b.find_index(Axis::X, 1.5), 1);
    }

    #[test]
    fn slab_stops_fall() {
        let slab = VoxelShape::from_boxes(vec![AABB::new(0.0, 0.0, 0.0, 1.0, 0.5, 1.0)]);
        let player = AABB::new(0.2, 1.0, 0.2, 0.8, 2.8, 0.8);
        assert_eq!(slab.collide(Axis::Y, &player, -1.0), -0.5);
    }

    #[test]
    fn gap_between_boxes_is_passable() {
        // two pillars with a gap in the middle along x
        let shape = VoxelShape::from_boxes(vec![
            AABB::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0),
            AABB::new(2.0, 0.0, 0.0, 3.0, 1.0, 1.0),
        ]);
        assert_eq!(shape.cells(Axis::X), 3);
        assert!(shape.is_full(0, 0, 0));
        assert!(!shape.is_full(1, 0, 0));
        assert!(shape.is_full(2, 0, 0));

        let falling = AABB::new(1.2, 2.0, 0.2, 1.8, 3.0, 0.8);
        assert_eq!(shape.collide(Axis::Y, &falling, -3.0), -3.0);

        let sliding = AABB::new(1.2, 0.2, 0.2, 1.8, 0.8, 0.8);
        assert!((shape.collide(Axis::X, &sliding, 1.0) - 0.2).abs() < 1e-9);
        assert!((shape.collide(Axis::X, &sliding, -1.0) + 0.2).abs() < 1e-9);
    }

    #[test]
    fn moved_shape() {
        let shape = VoxelShape::block().move_by(0.0, 0.0, 5.0);
        assert_eq!(shape.bounds(), Some(AABB::new(0.0, 0.0, 5.0, 1.0, 1.0, 6.0)));
        let mover = AABB::new(0.2, 0.2, 3.0, 0.8, 0.8, 4.0);
        assert_eq!(shape.collide(Axis::Z, &mover, 3.0), 1.0);
    }

    #[test]
    fn empty_shape_never_blocks() {
        let mover = AABB::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        assert_eq!(VoxelShape::empty().collide(Axis::Y, &mover, -4.0), -4.0);
        assert!(VoxelShape::from_boxes(vec![AABB::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0)]).is_empty());
    }
}

pub mod aabb;
pub mod direction;
pub mod shape;
pub mod vec3;

pub use aabb::{BlockHitResult, AABB, EPSILON};
pub use direction::{Axis, AxisCycle, AxisDirection, Direction};
pub use shape::{CollisionGrid, VoxelShape};
pub use vec3::{lerp, Vec3};

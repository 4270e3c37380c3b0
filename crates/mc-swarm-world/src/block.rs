//! Block state ids and collision shapes.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::WorldError;
use crate::geometry::{VoxelShape, AABB};

/// Network block state id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockState(pub i32);

impl BlockState {
    pub const AIR: BlockState = BlockState(0);

    /// Returned for positions outside build height or in unloaded chunks.
    /// Never stored in a section.
    pub const VOID_AIR: BlockState = BlockState(-1);

    pub fn id(self) -> i32 {
        self.0
    }

    pub fn is_void(self) -> bool {
        self == Self::VOID_AIR
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_void() {
            f.write_str("void_air")
        } else {
            write!(f, "state#{}", self.0)
        }
    }
}

/// Maps block states to collision shapes in block-local coordinates.
pub trait CollisionShapeProvider: Send + Sync {
    fn collision_shape(&self, state: BlockState) -> &VoxelShape;

    /// Air-like states are skipped by section block counts.
    fn is_air(&self, state: BlockState) -> bool;
}

const BUNDLED_GZ: &[u8] = include_bytes!("../resources/block_shapes.json.gz");

static BUNDLED: OnceLock<Arc<BlockShapeTable>> = OnceLock::new();

/// Table file layout: a list of shapes (each a list of `[min_x, min_y,
/// min_z, max_x, max_y, max_z]` boxes), inclusive state ranges pointing at
/// a shape, and inclusive ranges of air-like states.
#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    version: Option<String>,
    shapes: Vec<Vec<[f64; 6]>>,
    default_shape: usize,
    #[serde(default)]
    states: Vec<(i32, i32, usize)>,
    #[serde(default)]
    air: Vec<(i32, i32)>,
}

/// Collision shapes per block state, read from a generated table. States
/// not covered by any range use the default shape.
#[derive(Debug, Clone)]
pub struct BlockShapeTable {
    version: Option<String>,
    shapes: Vec<VoxelShape>,
    default_shape: usize,
    /// Sorted by first state, non-overlapping.
    ranges: Vec<(i32, i32, usize)>,
    air: Vec<(i32, i32)>,
    empty: VoxelShape,
}

impl BlockShapeTable {
    /// The table bundled with the binary, decoded on first use. A broken
    /// resource is logged once and replaced by [`BlockShapeTable::solid`].
    pub fn bundled() -> Arc<Self> {
        let table = BUNDLED.get_or_init(|| match Self::decode(BUNDLED_GZ) {
            Ok(table) => Arc::new(table),
            Err(e) => {
                error!("Failed to load bundled block shapes: {e}");
                Arc::new(Self::solid([BlockState::AIR]))
            }
        });
        Arc::clone(table)
    }

    /// Every state is a full cube except the given air states.
    pub fn solid(air: impl IntoIterator<Item = BlockState>) -> Self {
        let air: Vec<(i32, i32)> = air.into_iter().map(|s| (s.id(), s.id())).collect();
        let ranges = air.iter().map(|&(first, last)| (first, last, 0)).collect();
        Self::build(None, vec![VoxelShape::empty(), VoxelShape::block()], 1, ranges, air)
    }

    /// Read a gzip-compressed table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldError> {
        let gz = std::fs::read(path)?;
        Self::decode(&gz)
    }

    pub fn decode(gz: &[u8]) -> Result<Self, WorldError> {
        let mut json = String::new();
        GzDecoder::new(gz).read_to_string(&mut json)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        let raw: RawTable =
            serde_json::from_str(json).map_err(|e| WorldError::InvalidShapes(e.to_string()))?;
        if raw.default_shape >= raw.shapes.len() {
            return Err(WorldError::InvalidShapes(format!(
                "default shape {} out of {} shapes",
                raw.default_shape,
                raw.shapes.len()
            )));
        }
        for &(first, last, shape) in &raw.states {
            if first > last || shape >= raw.shapes.len() {
                return Err(WorldError::InvalidShapes(format!(
                    "bad state range {first}..={last} -> {shape}"
                )));
            }
        }
        let shapes = raw
            .shapes
            .iter()
            .map(|boxes| {
                VoxelShape::from_boxes(
                    boxes
                        .iter()
                        .map(|b| AABB::new(b[0], b[1], b[2], b[3], b[4], b[5]))
                        .collect(),
                )
            })
            .collect();
        let table = Self::build(raw.version, shapes, raw.default_shape, raw.states, raw.air);
        debug!(
            "Loaded {} block shapes over {} state ranges (version {})",
            table.shapes.len(),
            table.ranges.len(),
            table.version.as_deref().unwrap_or("unknown")
        );
        Ok(table)
    }

    fn build(
        version: Option<String>,
        shapes: Vec<VoxelShape>,
        default_shape: usize,
        mut ranges: Vec<(i32, i32, usize)>,
        mut air: Vec<(i32, i32)>,
    ) -> Self {
        ranges.sort_by_key(|r| r.0);
        air.sort_by_key(|r| r.0);
        Self {
            version,
            shapes,
            default_shape,
            ranges,
            air,
            empty: VoxelShape::empty(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn shape_index(&self, id: i32) -> usize {
        let after = self.ranges.partition_point(|r| r.0 <= id);
        match after.checked_sub(1).map(|i| self.ranges[i]) {
            Some((_, last, shape)) if id <= last => shape,
            _ => self.default_shape,
        }
    }
}

impl CollisionShapeProvider for BlockShapeTable {
    fn collision_shape(&self, state: BlockState) -> &VoxelShape {
        if state.is_void() {
            return &self.empty;
        }
        &self.shapes[self.shape_index(state.id())]
    }

    fn is_air(&self, state: BlockState) -> bool {
        if state.is_void() {
            return true;
        }
        let id = state.id();
        let after = self.air.partition_point(|r| r.0 <= id);
        after
            .checked_sub(1)
            .is_some_and(|i| id <= self.air[i].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_table_shapes() {
        let shapes = BlockShapeTable::solid([BlockState::AIR, BlockState(13)]);
        assert!(shapes.collision_shape(BlockState::AIR).is_empty());
        assert!(shapes.collision_shape(BlockState(13)).is_empty());
        assert!(shapes.collision_shape(BlockState::VOID_AIR).is_empty());
        assert!(!shapes.collision_shape(BlockState(1)).is_empty());
        assert!(shapes.is_air(BlockState::VOID_AIR));
        assert!(shapes.is_air(BlockState(13)));
        assert!(!shapes.is_air(BlockState(12)));
    }

    #[test]
    fn bundled_table_has_fluids_and_plants_without_collision() {
        let shapes = BlockShapeTable::bundled();
        assert_eq!(shapes.version(), Some("1.21.4"));
        assert!(shapes.is_air(BlockState::AIR));
        assert!(!shapes.collision_shape(BlockState(1)).is_empty());
        for water in [86, 93, 101] {
            assert!(shapes.collision_shape(BlockState(water)).is_empty());
            assert!(!shapes.is_air(BlockState(water)));
        }
        assert!(shapes.collision_shape(BlockState(110)).is_empty());
        assert!(shapes.collision_shape(BlockState(30)).is_empty());
        assert!(!shapes.collision_shape(BlockState(85)).is_empty());
        assert!(!shapes.collision_shape(BlockState(118)).is_empty());
    }

    #[test]
    fn partial_shapes_from_json() {
        let shapes = BlockShapeTable::from_json(
            r#"{"shapes":[[],[[0,0,0,1,1,1]],[[0,0,0,1,0.5,1]]],"default_shape":1,
                "states":[[20,21,2],[5,5,0]],"air":[[5,5]]}"#,
        )
        .unwrap();
        let slab = shapes.collision_shape(BlockState(21)).bounds().unwrap();
        assert_eq!(slab.max_y, 0.5);
        assert!(shapes.collision_shape(BlockState(5)).is_empty());
        assert!(shapes.is_air(BlockState(5)));
        assert!(!shapes.collision_shape(BlockState(22)).is_empty());
        assert!(shapes.version().is_none());
    }

    #[test]
    fn invalid_tables_are_rejected() {
        assert!(BlockShapeTable::from_json(r#"{"shapes":[[]],"default_shape":1}"#).is_err());
        assert!(BlockShapeTable::from_json(
            r#"{"shapes":[[]],"default_shape":0,"states":[[3,2,0]]}"#
        )
        .is_err());
        assert!(BlockShapeTable::from_json("[").is_err());
    }
}

//! Per-dimension world state.

use std::sync::Arc;

use mc_swarm_proto::types::{BlockPos, Identifier};
use tracing::debug;

use crate::block::{BlockState, CollisionShapeProvider};
use crate::dimension::DimensionType;
use crate::geometry::{AABB, EPSILON};
use crate::section::SectionInterner;
use crate::store::{BlockAccessor, ChunkStore};
use crate::tags::TagsState;

/// One dimension as the bot sees it. Replaced wholesale on respawn into
/// another dimension.
pub struct Level {
    dimension: Identifier,
    dimension_type: DimensionType,
    tags: TagsState,
    chunks: ChunkStore,
    world_age: i64,
    day_time: i64,
    tick_day_time: bool,
    hashed_seed: i64,
    is_debug: bool,
    is_flat: bool,
    sea_level: i32,
}

/// Spawn information carried by join and respawn packets.
#[derive(Debug, Clone)]
pub struct LevelInfo {
    pub dimension: Identifier,
    pub dimension_type: DimensionType,
    pub hashed_seed: i64,
    pub is_debug: bool,
    pub is_flat: bool,
    pub sea_level: i32,
}

impl Level {
    pub fn new(
        info: LevelInfo,
        tags: TagsState,
        shapes: Arc<dyn CollisionShapeProvider>,
        interner: Arc<SectionInterner>,
    ) -> Self {
        let dimension_type = info.dimension_type;
        let chunks = ChunkStore::new(dimension_type.min_y, dimension_type.height, interner, shapes);
        debug!(
            "Created level {} (min_y {}, height {})",
            info.dimension, dimension_type.min_y, dimension_type.height
        );
        Self {
            dimension: info.dimension,
            dimension_type,
            tags,
            chunks,
            world_age: 0,
            day_time: 0,
            tick_day_time: true,
            hashed_seed: info.hashed_seed,
            is_debug: info.is_debug,
            is_flat: info.is_flat,
            sea_level: info.sea_level,
        }
    }

    pub fn dimension(&self) -> &Identifier {
        &self.dimension
    }

    pub fn dimension_type(&self) -> &DimensionType {
        &self.dimension_type
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn tags(&self) -> &TagsState {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagsState {
        &mut self.tags
    }

    pub fn shapes(&self) -> &Arc<dyn CollisionShapeProvider> {
        self.chunks.shapes()
    }

    pub fn hashed_seed(&self) -> i64 {
        self.hashed_seed
    }

    pub fn is_debug(&self) -> bool {
        self.is_debug
    }

    pub fn is_flat(&self) -> bool {
        self.is_flat
    }

    pub fn sea_level(&self) -> i32 {
        self.sea_level
    }

    pub fn min_build_height(&self) -> i32 {
        self.dimension_type.min_y
    }

    pub fn max_build_height(&self) -> i32 {
        self.dimension_type.max_y()
    }

    pub fn is_outside_build_height(&self, y: f64) -> bool {
        y < self.min_build_height() as f64 || y >= self.max_build_height() as f64
    }

    pub fn world_age(&self) -> i64 {
        self.world_age
    }

    pub fn day_time(&self) -> i64 {
        self.day_time
    }

    pub fn set_time(&mut self, world_age: i64, day_time: i64, tick_day_time: bool) {
        self.world_age = world_age;
        self.day_time = day_time;
        self.tick_day_time = tick_day_time;
    }

    /// Advance the clocks by one game tick.
    pub fn tick(&mut self) {
        self.world_age += 1;
        if self.tick_day_time && self.dimension_type.fixed_time.is_none() {
            self.day_time += 1;
        }
    }

    pub fn get_block_state(&self, pos: BlockPos) -> BlockState {
        self.chunks.get_block_state_at(pos)
    }

    /// Ignored for unloaded chunks.
    pub fn set_block_state(&self, pos: BlockPos, state: BlockState) {
        self.chunks.set_block_state(pos.x, pos.y, pos.z, state);
    }

    pub fn is_chunk_loaded(&self, pos: BlockPos) -> bool {
        self.chunks.is_chunk_position_loaded(pos)
    }

    /// Absolute collision boxes of every block near `aabb` that intersect it.
    /// Each chunk column is read under one lock; unloaded columns and
    /// positions outside build height have no collision.
    pub fn get_collision_boxes(&self, aabb: &AABB) -> Vec<AABB> {
        let start_x = (aabb.min_x - EPSILON).floor() as i32 - 1;
        let end_x = (aabb.max_x + EPSILON).floor() as i32 + 1;
        let start_y = ((aabb.min_y - EPSILON).floor() as i32 - 1).max(self.chunks.min_y());
        let end_y = ((aabb.max_y + EPSILON).floor() as i32 + 1).min(self.chunks.max_y() - 1);
        let start_z = (aabb.min_z - EPSILON).floor() as i32 - 1;
        let end_z = (aabb.max_z + EPSILON).floor() as i32 + 1;

        let mut boxes = Vec::new();
        if start_y > end_y {
            return boxes;
        }
        let min_section = self.chunks.min_section();
        let shapes = self.chunks.shapes();
        for cx in (start_x >> 4)..=(end_x >> 4) {
            for cz in (start_z >> 4)..=(end_z >> 4) {
                self.chunks.with_chunk(cx, cz, |chunk| {
                    for x in start_x.max(cx << 4)..=end_x.min((cx << 4) + 15) {
                        for z in start_z.max(cz << 4)..=end_z.min((cz << 4) + 15) {
                            for y in start_y..=end_y {
                                let Some(section) =
                                    chunk.section(((y >> 4) - min_section) as usize)
                                else {
                                    continue;
                                };
                                let state = section.get_block(
                                    (x & 15) as usize,
                                    (y & 15) as usize,
                                    (z & 15) as usize,
                                );
                                let pos = BlockPos::new(x, y, z);
                                boxes.extend(
                                    shapes
                                        .collision_shape(state)
                                        .to_boxes()
                                        .iter()
                                        .map(|b| b.move_to_block(pos))
                                        .filter(|b| b.intersects(aabb)),
                                );
                            }
                        }
                    }
                });
            }
        }
        boxes
    }
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level")
            .field("dimension", &self.dimension)
            .field("chunks", &self.chunks)
            .field("world_age", &self.world_age)
            .field("day_time", &self.day_time)
            .finish()
    }
}

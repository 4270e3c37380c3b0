//! Chunk storage for one level.
//!
//! The live [`ChunkStore`] sits behind a single reader/writer lock that is
//! held only for the map operation itself. [`ChunkStore::immutable_copy`]
//! hands out a lock-free [`ChunkSnapshot`]; since sections are never edited
//! in place, later writes to the live store cannot show through it.

use std::collections::HashMap;
use std::sync::Arc;

use mc_swarm_proto::types::{BlockPos, ChunkPos};
use parking_lot::RwLock;
use tracing::debug;

use crate::block::{BlockState, CollisionShapeProvider};
use crate::chunk::ChunkData;
use crate::section::SectionInterner;

/// Read access to blocks, shared by live stores and snapshots.
pub trait BlockAccessor {
    fn min_y(&self) -> i32;

    fn height(&self) -> i32;

    /// Run `f` against a loaded chunk column.
    fn with_chunk<R>(&self, x: i32, z: i32, f: impl FnOnce(&ChunkData) -> R) -> Option<R>;

    fn max_y(&self) -> i32 {
        self.min_y() + self.height()
    }

    fn min_section(&self) -> i32 {
        self.min_y() >> 4
    }

    fn max_section(&self) -> i32 {
        ((self.max_y() - 1) >> 4) + 1
    }

    fn sections_count(&self) -> usize {
        (self.max_section() - self.min_section()) as usize
    }

    fn is_outside_build_height(&self, y: i32) -> bool {
        y < self.min_y() || y >= self.max_y()
    }

    /// `VOID_AIR` outside build height and in unloaded chunks.
    fn get_block_state(&self, x: i32, y: i32, z: i32) -> BlockState {
        if self.is_outside_build_height(y) {
            return BlockState::VOID_AIR;
        }
        let index = ((y >> 4) - self.min_section()) as usize;
        self.with_chunk(x >> 4, z >> 4, |chunk| {
            chunk
                .section(index)
                .map(|s| s.get_block((x & 15) as usize, (y & 15) as usize, (z & 15) as usize))
        })
        .flatten()
        .unwrap_or(BlockState::VOID_AIR)
    }

    fn get_block_state_at(&self, pos: BlockPos) -> BlockState {
        self.get_block_state(pos.x, pos.y, pos.z)
    }

    /// Biome id at block coordinates, `None` when unloaded or out of height.
    fn get_biome(&self, x: i32, y: i32, z: i32) -> Option<i32> {
        if self.is_outside_build_height(y) {
            return None;
        }
        let index = ((y >> 4) - self.min_section()) as usize;
        self.with_chunk(x >> 4, z >> 4, |chunk| {
            chunk.section(index).map(|s| {
                s.get_biome(
                    ((x & 15) >> 2) as usize,
                    ((y & 15) >> 2) as usize,
                    ((z & 15) >> 2) as usize,
                )
            })
        })
        .flatten()
    }
}

// ---------------------------------------------------------------------------
// ChunkStore
// ---------------------------------------------------------------------------

pub struct ChunkStore {
    min_y: i32,
    height: i32,
    chunks: RwLock<HashMap<i64, ChunkData>>,
    interner: Arc<SectionInterner>,
    shapes: Arc<dyn CollisionShapeProvider>,
}

impl ChunkStore {
    pub fn new(
        min_y: i32,
        height: i32,
        interner: Arc<SectionInterner>,
        shapes: Arc<dyn CollisionShapeProvider>,
    ) -> Self {
        Self {
            min_y,
            height,
            chunks: RwLock::new(HashMap::new()),
            interner,
            shapes,
        }
    }

    pub fn interner(&self) -> &Arc<SectionInterner> {
        &self.interner
    }

    pub fn shapes(&self) -> &Arc<dyn CollisionShapeProvider> {
        &self.shapes
    }

    pub fn get_chunk(&self, x: i32, z: i32) -> Option<ChunkData> {
        self.chunks.read().get(&ChunkPos::new(x, z).key()).cloned()
    }

    pub fn is_chunk_loaded(&self, x: i32, z: i32) -> bool {
        self.chunks.read().contains_key(&ChunkPos::new(x, z).key())
    }

    /// Whether the chunk holding a block position is loaded.
    pub fn is_chunk_position_loaded(&self, pos: BlockPos) -> bool {
        self.is_chunk_loaded(pos.x >> 4, pos.z >> 4)
    }

    /// Every chunk overlapping the block rectangle, inclusive, is loaded.
    pub fn has_chunks_at(&self, min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> bool {
        let chunks = self.chunks.read();
        for cx in (min_x >> 4)..=(max_x >> 4) {
            for cz in (min_z >> 4)..=(max_z >> 4) {
                if !chunks.contains_key(&ChunkPos::new(cx, cz).key()) {
                    return false;
                }
            }
        }
        true
    }

    /// Block box variant: false when the box misses the build height.
    pub fn has_chunks_in(&self, from: BlockPos, to: BlockPos) -> bool {
        to.y >= self.min_y
            && from.y < self.max_y()
            && self.has_chunks_at(from.x, from.z, to.x, to.z)
    }

    pub fn set_chunk(&self, x: i32, z: i32, chunk: ChunkData) {
        self.chunks.write().insert(ChunkPos::new(x, z).key(), chunk);
    }

    pub fn remove_chunk(&self, x: i32, z: i32) -> Option<ChunkData> {
        self.chunks.write().remove(&ChunkPos::new(x, z).key())
    }

    pub fn get_or_create_chunk(&self, x: i32, z: i32) -> ChunkData {
        let count = self.sections_count();
        self.chunks
            .write()
            .entry(ChunkPos::new(x, z).key())
            .or_insert_with(|| ChunkData::empty(count, &self.interner))
            .clone()
    }

    /// Apply `f` to a loaded chunk in place. Returns false when unloaded.
    pub fn update_chunk(&self, x: i32, z: i32, f: impl FnOnce(&mut ChunkData)) -> bool {
        match self.chunks.write().get_mut(&ChunkPos::new(x, z).key()) {
            Some(chunk) => {
                f(chunk);
                true
            }
            None => false,
        }
    }

    /// Replace one block. Ignored for unloaded chunks and positions outside
    /// build height.
    pub fn set_block_state(&self, x: i32, y: i32, z: i32, state: BlockState) {
        if self.is_outside_build_height(y) {
            debug!("Ignoring block update outside build height at ({x}, {y}, {z})");
            return;
        }
        let index = ((y >> 4) - self.min_section()) as usize;
        let key = ChunkPos::new(x >> 4, z >> 4).key();

        let Some(current) = self
            .chunks
            .read()
            .get(&key)
            .and_then(|c| c.section(index).cloned())
        else {
            debug!("Ignoring block update in unloaded chunk at ({x}, {y}, {z})");
            return;
        };
        let updated = self.interner.intern(current.with_block(
            (x & 15) as usize,
            (y & 15) as usize,
            (z & 15) as usize,
            state,
            self.shapes.as_ref(),
        ));
        if let Some(chunk) = self.chunks.write().get_mut(&key) {
            chunk.set_section(index, updated);
        }
    }

    /// Copy of the chunk map; sections are shared.
    pub fn chunks(&self) -> HashMap<i64, ChunkData> {
        self.chunks.read().clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn immutable_copy(&self) -> ChunkSnapshot {
        ChunkSnapshot {
            min_y: self.min_y,
            height: self.height,
            chunks: self.chunks(),
        }
    }
}

impl BlockAccessor for ChunkStore {
    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn with_chunk<R>(&self, x: i32, z: i32, f: impl FnOnce(&ChunkData) -> R) -> Option<R> {
        self.chunks.read().get(&ChunkPos::new(x, z).key()).map(f)
    }
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("min_y", &self.min_y)
            .field("height", &self.height)
            .field("chunks", &self.chunk_count())
            .finish()
    }
}

/// Frozen view of a [`ChunkStore`].
#[derive(Debug, Clone)]
pub struct ChunkSnapshot {
    min_y: i32,
    height: i32,
    chunks: HashMap<i64, ChunkData>,
}

impl ChunkSnapshot {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl BlockAccessor for ChunkSnapshot {
    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn with_chunk<R>(&self, x: i32, z: i32, f: impl FnOnce(&ChunkData) -> R) -> Option<R> {
        self.chunks.get(&ChunkPos::new(x, z).key()).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::block::BlockShapeTable;

    fn store(min_y: i32, height: i32) -> ChunkStore {
        ChunkStore::new(
            min_y,
            height,
            Arc::new(SectionInterner::new()),
            Arc::new(BlockShapeTable::solid([BlockState::AIR])),
        )
    }

    fn overworld() -> ChunkStore {
        store(-64, 384)
    }

    #[test]
    fn section_bounds() {
        let store = overworld();
        assert_eq!(store.min_section(), -4);
        assert_eq!(store.max_section(), 20);
        assert_eq!(store.sections_count(), 24);

        let odd = self::store(0, 40);
        assert_eq!(odd.max_section(), 3);
        assert_eq!(odd.sections_count(), 3);
    }

    #[test]
    fn void_air_sentinel() {
        let store = overworld();
        assert_eq!(store.get_block_state(0, 0, 0), BlockState::VOID_AIR);
        store.get_or_create_chunk(0, 0);
        assert_eq!(store.get_block_state(0, 0, 0), BlockState::AIR);
        assert_eq!(store.get_block_state(0, -65, 0), BlockState::VOID_AIR);
        assert_eq!(store.get_block_state(0, 320, 0), BlockState::VOID_AIR);
        assert_eq!(store.get_block_state(0, 319, 0), BlockState::AIR);
        assert_eq!(store.get_block_state(16, 0, 0), BlockState::VOID_AIR);
    }

    #[test]
    fn set_block_in_negative_coordinates() {
        let store = overworld();
        store.get_or_create_chunk(-1, -1);
        store.set_block_state(-1, -64, -16, BlockState(5));
        assert_eq!(store.get_block_state(-1, -64, -16), BlockState(5));
        assert_eq!(store.get_block_state(-2, -64, -16), BlockState::AIR);
        assert_eq!(store.get_biome(-1, -64, -16), Some(0));
    }

    #[test]
    fn set_block_in_unloaded_chunk_is_ignored() {
        let store = overworld();
        store.set_block_state(100, 10, 100, BlockState(1));
        assert!(!store.is_chunk_loaded(6, 6));
        assert_eq!(store.get_block_state(100, 10, 100), BlockState::VOID_AIR);
    }

    #[test]
    fn snapshot_is_isolated_from_writes() {
        let store = overworld();
        store.get_or_create_chunk(0, 0);
        store.set_block_state(1, 1, 1, BlockState(3));
        let snapshot = store.immutable_copy();

        store.set_block_state(1, 1, 1, BlockState(4));
        store.get_or_create_chunk(1, 0);
        store.remove_chunk(0, 0);

        assert_eq!(snapshot.get_block_state(1, 1, 1), BlockState(3));
        assert_eq!(snapshot.get_block_state(17, 1, 1), BlockState::VOID_AIR);
        assert_eq!(snapshot.chunk_count(), 1);
        assert_eq!(store.get_block_state(1, 1, 1), BlockState::VOID_AIR);
    }

    #[test]
    fn has_chunks_at_rectangle() {
        let store = overworld();
        store.get_or_create_chunk(0, 0);
        store.get_or_create_chunk(1, 0);
        assert!(store.has_chunks_at(0, 0, 31, 15));
        assert!(!store.has_chunks_at(0, 0, 32, 15));
        assert!(!store.has_chunks_at(-1, 0, 0, 0));
        assert!(store.has_chunks_in(BlockPos::new(0, 0, 0), BlockPos::new(20, 5, 5)));
        assert!(!store.has_chunks_in(BlockPos::new(0, 400, 0), BlockPos::new(20, 405, 5)));
    }

    #[test]
    fn edits_share_untouched_sections() {
        let store = overworld();
        store.get_or_create_chunk(0, 0);
        let before = store.get_chunk(0, 0).unwrap();
        store.set_block_state(0, 100, 0, BlockState(2));
        let after = store.get_chunk(0, 0).unwrap();
        assert!(Arc::ptr_eq(&before.sections()[0], &after.sections()[0]));
        assert!(!Arc::ptr_eq(&before.sections()[10], &after.sections()[10]));
        assert!(Arc::ptr_eq(before.sections()[10].biomes(), after.sections()[10].biomes()));
    }

    #[test]
    fn chunks_is_a_copy() {
        let store = overworld();
        store.get_or_create_chunk(0, 0);
        let mut copy = store.chunks();
        copy.clear();
        assert_eq!(store.chunk_count(), 1);
        assert!(store.is_chunk_position_loaded(BlockPos::new(15, 0, 15)));
    }
}

//! Chunk sections and the section interner.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use bytes::{Buf, BufMut};
use mc_swarm_proto::codec::ensure_remaining;
use parking_lot::Mutex;

use crate::block::{BlockState, CollisionShapeProvider};
use crate::error::WorldError;
use crate::palette::{ContainerKind, PalettedContainer};

/// One 16x16x16 slice of a chunk column. Sections are immutable once built;
/// edits produce a new section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkSection {
    block_count: i16,
    blocks: PalettedContainer,
    biomes: Arc<PalettedContainer>,
}

impl ChunkSection {
    pub fn new(block_count: i16, blocks: PalettedContainer, biomes: Arc<PalettedContainer>) -> Self {
        Self {
            block_count,
            blocks,
            biomes,
        }
    }

    /// All air, one biome.
    pub fn empty(biome: i32) -> Self {
        Self::new(
            0,
            PalettedContainer::single(ContainerKind::Blocks, BlockState::AIR.id()),
            Arc::new(PalettedContainer::single(ContainerKind::Biomes, biome)),
        )
    }

    pub fn read(buf: &mut impl Buf) -> Result<Self, WorldError> {
        ensure_remaining(buf, 2)?;
        let block_count = buf.get_i16();
        let blocks = PalettedContainer::read(ContainerKind::Blocks, buf)?;
        let biomes = PalettedContainer::read(ContainerKind::Biomes, buf)?;
        Ok(Self::new(block_count, blocks, Arc::new(biomes)))
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_i16(self.block_count);
        self.blocks.write(buf);
        self.biomes.write(buf);
    }

    /// Non-air blocks, as reported by the server and kept up to date by edits.
    pub fn block_count(&self) -> i16 {
        self.block_count
    }

    pub fn has_only_air(&self) -> bool {
        self.block_count == 0
    }

    pub fn blocks(&self) -> &PalettedContainer {
        &self.blocks
    }

    pub fn biomes(&self) -> &Arc<PalettedContainer> {
        &self.biomes
    }

    /// Local coordinates in `0..16`.
    pub fn get_block(&self, x: usize, y: usize, z: usize) -> BlockState {
        BlockState(self.blocks.get_at(x, y, z))
    }

    /// Quart coordinates in `0..4`.
    pub fn get_biome(&self, x: usize, y: usize, z: usize) -> i32 {
        self.biomes.get_at(x, y, z)
    }

    /// Copy of this section with one block replaced. The biome container is
    /// shared with the original. `shapes` decides which states count as air.
    pub fn with_block(
        &self,
        x: usize,
        y: usize,
        z: usize,
        state: BlockState,
        shapes: &dyn CollisionShapeProvider,
    ) -> Self {
        let old = self.get_block(x, y, z);
        let mut blocks = self.blocks.clone();
        blocks.set(ContainerKind::Blocks.index(x, y, z), state.id());

        let mut block_count = self.block_count;
        let solid = |s: BlockState| !shapes.is_air(s);
        match (solid(old), solid(state)) {
            (false, true) => block_count += 1,
            (true, false) => block_count -= 1,
            _ => {}
        }
        Self::new(block_count, blocks, Arc::clone(&self.biomes))
    }

    pub fn with_biomes(&self, biomes: Arc<PalettedContainer>) -> Self {
        Self::new(self.block_count, self.blocks.clone(), biomes)
    }
}

// ---------------------------------------------------------------------------
// SectionInterner
// ---------------------------------------------------------------------------

/// Buckets allowed before the first sweep of dead entries.
const MIN_PURGE_THRESHOLD: usize = 1024;

/// Deduplicates structurally equal sections. The table only holds weak
/// references, so a section lives exactly as long as some chunk uses it.
/// Dead buckets are swept whenever the table doubles past its last live
/// size.
#[derive(Debug)]
pub struct SectionInterner {
    table: Mutex<InternTable>,
}

#[derive(Debug)]
struct InternTable {
    buckets: HashMap<u64, Vec<Weak<ChunkSection>>>,
    purge_at: usize,
}

impl InternTable {
    fn purge(&mut self) {
        self.buckets.retain(|_, bucket| {
            bucket.retain(|weak| weak.strong_count() > 0);
            !bucket.is_empty()
        });
        self.purge_at = (self.buckets.len() * 2).max(MIN_PURGE_THRESHOLD);
    }
}

impl Default for SectionInterner {
    fn default() -> Self {
        Self {
            table: Mutex::new(InternTable {
                buckets: HashMap::new(),
                purge_at: MIN_PURGE_THRESHOLD,
            }),
        }
    }
}

impl SectionInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, section: ChunkSection) -> Arc<ChunkSection> {
        let mut hasher = DefaultHasher::new();
        section.hash(&mut hasher);
        let key = hasher.finish();

        let mut table = self.table.lock();
        if table.buckets.len() >= table.purge_at {
            table.purge();
        }
        let bucket = table.buckets.entry(key).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);
        if let Some(existing) = bucket
            .iter()
            .filter_map(Weak::upgrade)
            .find(|candidate| **candidate == section)
        {
            return existing;
        }
        let section = Arc::new(section);
        bucket.push(Arc::downgrade(&section));
        section
    }

    /// Sections still referenced by at least one chunk.
    pub fn live(&self) -> usize {
        self.table
            .lock()
            .buckets
            .values()
            .flatten()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Hash buckets currently held, live or not.
    pub fn bucket_count(&self) -> usize {
        self.table.lock().buckets.len()
    }

    /// Drop buckets whose sections are all gone.
    pub fn purge(&self) {
        self.table.lock().purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    use crate::block::BlockShapeTable;

    #[test]
    fn with_block_copies_and_counts() {
        let shapes = BlockShapeTable::solid([BlockState::AIR]);
        let empty = ChunkSection::empty(1);
        let stone = empty.with_block(1, 2, 3, BlockState(1), &shapes);
        assert_eq!(stone.block_count(), 1);
        assert_eq!(stone.get_block(1, 2, 3), BlockState(1));
        assert_eq!(empty.get_block(1, 2, 3), BlockState::AIR);
        assert!(Arc::ptr_eq(stone.biomes(), empty.biomes()));

        let back = stone.with_block(1, 2, 3, BlockState::AIR, &shapes);
        assert!(back.has_only_air());
        let replaced = stone.with_block(1, 2, 3, BlockState(2), &shapes);
        assert_eq!(replaced.block_count(), 1);
    }

    #[test]
    fn block_count_uses_the_air_table() {
        let cave_air = BlockState(13);
        let shapes = BlockShapeTable::solid([BlockState::AIR, cave_air]);
        let stone = ChunkSection::empty(0).with_block(0, 0, 0, BlockState(1), &shapes);
        let cave = stone.with_block(0, 0, 0, cave_air, &shapes);
        assert!(cave.has_only_air());
        let still = cave.with_block(1, 0, 0, cave_air, &shapes);
        assert_eq!(still.block_count(), 0);
    }

    #[test]
    fn interner_shares_equal_sections() {
        let interner = SectionInterner::new();
        let a = interner.intern(ChunkSection::empty(0));
        let b = interner.intern(ChunkSection::empty(0));
        let c = interner.intern(ChunkSection::empty(5));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(interner.live(), 2);
    }

    #[test]
    fn interner_never_owns() {
        let interner = SectionInterner::new();
        let weak = Arc::downgrade(&interner.intern(ChunkSection::empty(0)));
        assert!(weak.upgrade().is_none());
        assert_eq!(interner.live(), 0);
        interner.purge();
        assert_eq!(interner.bucket_count(), 0);
    }

    #[test]
    fn dead_buckets_are_swept_while_interning() {
        let interner = SectionInterner::new();
        for biome in 0..10_000 {
            drop(interner.intern(ChunkSection::empty(biome)));
        }
        assert_eq!(interner.live(), 0);
        assert!(interner.bucket_count() <= MIN_PURGE_THRESHOLD);

        let kept: Vec<_> = (0..3000)
            .map(|biome| interner.intern(ChunkSection::empty(biome)))
            .collect();
        assert_eq!(interner.live(), kept.len());
        assert!(Arc::ptr_eq(&kept[7], &interner.intern(ChunkSection::empty(7))));
    }

    #[test]
    fn read_write_section() {
        let shapes = BlockShapeTable::solid([BlockState::AIR]);
        let section = ChunkSection::empty(2).with_block(0, 0, 0, BlockState(9), &shapes);
        let mut buf = BytesMut::new();
        section.write(&mut buf);
        let mut data = buf.freeze();
        assert_eq!(ChunkSection::read(&mut data).unwrap(), section);
        assert!(!data.has_remaining());
    }
}

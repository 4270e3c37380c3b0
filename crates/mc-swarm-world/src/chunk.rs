//! Chunk columns.

use std::sync::Arc;

use bytes::Buf;
use tracing::trace;

use crate::error::WorldError;
use crate::palette::{ContainerKind, PalettedContainer};
use crate::section::{ChunkSection, SectionInterner};

/// A column of sections, lowest first. Cloning shares the sections.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkData {
    sections: Vec<Arc<ChunkSection>>,
}

impl ChunkData {
    pub fn empty(sections_count: usize, interner: &SectionInterner) -> Self {
        let air = interner.intern(ChunkSection::empty(0));
        Self {
            sections: vec![air; sections_count],
        }
    }

    /// Decode the section payload of a chunk packet.
    pub fn read(
        buf: &mut impl Buf,
        sections_count: usize,
        interner: &SectionInterner,
    ) -> Result<Self, WorldError> {
        let mut sections = Vec::with_capacity(sections_count);
        for _ in 0..sections_count {
            sections.push(interner.intern(ChunkSection::read(buf)?));
        }
        if buf.has_remaining() {
            trace!("{} trailing bytes after chunk sections", buf.remaining());
        }
        Ok(Self { sections })
    }

    /// Replace every section's biomes from a chunk biomes payload. The
    /// column is left untouched if any container fails to decode.
    pub fn read_biomes(
        &mut self,
        buf: &mut impl Buf,
        interner: &SectionInterner,
    ) -> Result<(), WorldError> {
        let biomes = (0..self.sections.len())
            .map(|_| PalettedContainer::read(ContainerKind::Biomes, buf))
            .collect::<Result<Vec<_>, _>>()?;
        for (section, biomes) in self.sections.iter_mut().zip(biomes) {
            *section = interner.intern(section.with_biomes(Arc::new(biomes)));
        }
        Ok(())
    }

    pub fn sections(&self) -> &[Arc<ChunkSection>] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Arc<ChunkSection>> {
        self.sections.get(index)
    }

    pub fn set_section(&mut self, index: usize, section: Arc<ChunkSection>) {
        if let Some(slot) = self.sections.get_mut(index) {
            *slot = section;
        }
    }
}

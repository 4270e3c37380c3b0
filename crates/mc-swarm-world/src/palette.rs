//! Paletted containers for section block states and biomes.
//!
//! ```text
//! u8 bits | palette | VarInt(long count) | i64[long count]
//!
//! bits == 0   palette = VarInt(value)             every entry is that value
//! indirect    palette = VarInt(len) VarInt[len]   entries index the palette
//! direct      (no palette)                        entries are raw ids
//! ```
//!
//! Entries are packed `64 / bits` per long, low bits first, never spanning
//! two longs.

use bytes::{Buf, BufMut};
use mc_swarm_proto::codec::{ensure_remaining, read_len, ProtoDecode, ProtoEncode};
use mc_swarm_proto::types::VarInt;

use crate::error::WorldError;

/// Which strategy a container follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// 16x16x16 block states.
    Blocks,
    /// 4x4x4 biomes.
    Biomes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Single,
    Indirect(u8),
    Direct(u8),
}

impl ContainerKind {
    pub fn entries(self) -> usize {
        match self {
            ContainerKind::Blocks => 4096,
            ContainerKind::Biomes => 64,
        }
    }

    /// Bits used once the palette overflows into raw ids.
    pub fn direct_bits(self) -> u8 {
        match self {
            ContainerKind::Blocks => 15,
            ContainerKind::Biomes => 7,
        }
    }

    fn layout(self, bits: u8) -> Layout {
        match (self, bits) {
            (_, 0) => Layout::Single,
            (ContainerKind::Blocks, 1..=4) => Layout::Indirect(4),
            (ContainerKind::Blocks, 5..=8) => Layout::Indirect(bits),
            (ContainerKind::Biomes, 1..=3) => Layout::Indirect(bits),
            _ => Layout::Direct(bits),
        }
    }

    /// Entry index of local coordinates (`0..16` for blocks, `0..4` for biomes).
    pub fn index(self, x: usize, y: usize, z: usize) -> usize {
        match self {
            ContainerKind::Blocks => (y << 8) | (z << 4) | x,
            ContainerKind::Biomes => (y << 4) | (z << 2) | x,
        }
    }
}

// ---------------------------------------------------------------------------
// BitStorage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitStorage {
    bits: u8,
    size: usize,
    data: Vec<u64>,
}

impl BitStorage {
    pub fn new(bits: u8, size: usize) -> Self {
        Self {
            bits,
            size,
            data: vec![0; Self::required_longs(bits, size)],
        }
    }

    pub fn from_raw(bits: u8, size: usize, data: Vec<u64>) -> Result<Self, WorldError> {
        let expected = Self::required_longs(bits, size);
        if data.len() != expected {
            return Err(WorldError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { bits, size, data })
    }

    pub fn required_longs(bits: u8, size: usize) -> usize {
        if bits == 0 {
            return 0;
        }
        size.div_ceil(64 / bits as usize)
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn raw(&self) -> &[u64] {
        &self.data
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    fn locate(&self, index: usize) -> (usize, u32) {
        let per_long = 64 / self.bits as usize;
        (index / per_long, ((index % per_long) * self.bits as usize) as u32)
    }

    pub fn get(&self, index: usize) -> u32 {
        if self.bits == 0 || index >= self.size {
            return 0;
        }
        let (word, shift) = self.locate(index);
        ((self.data[word] >> shift) & self.mask()) as u32
    }

    pub fn set(&mut self, index: usize, value: u32) {
        if self.bits == 0 || index >= self.size {
            return;
        }
        let (word, shift) = self.locate(index);
        let mask = self.mask();
        self.data[word] = (self.data[word] & !(mask << shift)) | ((value as u64 & mask) << shift);
    }
}

// ---------------------------------------------------------------------------
// PalettedContainer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Palette {
    Single(i32),
    Indirect(Vec<i32>),
    Direct,
}

/// Palette plus packed entries. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PalettedContainer {
    kind: ContainerKind,
    palette: Palette,
    storage: BitStorage,
}

impl PalettedContainer {
    /// Container where every entry is `value`.
    pub fn single(kind: ContainerKind, value: i32) -> Self {
        Self {
            kind,
            palette: Palette::Single(value),
            storage: BitStorage::new(0, kind.entries()),
        }
    }

    pub fn read(kind: ContainerKind, buf: &mut impl Buf) -> Result<Self, WorldError> {
        ensure_remaining(buf, 1)?;
        let bits = buf.get_u8();
        let entries = kind.entries();
        let (palette, storage_bits) = match kind.layout(bits) {
            Layout::Single => (Palette::Single(VarInt::proto_decode(buf)?.0), 0),
            Layout::Indirect(storage_bits) => {
                let len = read_len(buf)?;
                if len == 0 || len > 1 << storage_bits {
                    return Err(WorldError::InvalidPalette(format!(
                        "{len} entries for {storage_bits} bits"
                    )));
                }
                let mut ids = Vec::with_capacity(len);
                for _ in 0..len {
                    ids.push(VarInt::proto_decode(buf)?.0);
                }
                (Palette::Indirect(ids), storage_bits)
            }
            Layout::Direct(storage_bits) => (Palette::Direct, storage_bits),
        };

        let longs = read_len(buf)?;
        ensure_remaining(buf, longs * 8)?;
        if storage_bits == 0 {
            // a single-valued container carries no entries; tolerate padding
            buf.advance(longs * 8);
            return Ok(Self {
                kind,
                palette,
                storage: BitStorage::new(0, entries),
            });
        }
        let data = (0..longs).map(|_| buf.get_u64()).collect();
        let storage = BitStorage::from_raw(storage_bits, entries, data)?;

        if let Palette::Indirect(ids) = &palette {
            if let Some(bad) = (0..entries).map(|i| storage.get(i)).find(|&i| i as usize >= ids.len()) {
                return Err(WorldError::InvalidPalette(format!(
                    "index {bad} outside palette of {}",
                    ids.len()
                )));
            }
        }
        Ok(Self {
            kind,
            palette,
            storage,
        })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.storage.bits());
        match &self.palette {
            Palette::Single(value) => VarInt(*value).proto_encode(buf),
            Palette::Indirect(ids) => {
                VarInt(ids.len() as i32).proto_encode(buf);
                for id in ids {
                    VarInt(*id).proto_encode(buf);
                }
            }
            Palette::Direct => {}
        }
        VarInt(self.storage.raw().len() as i32).proto_encode(buf);
        for long in self.storage.raw() {
            buf.put_u64(*long);
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn bits(&self) -> u8 {
        self.storage.bits()
    }

    /// The value every entry holds, when the container is single-valued.
    pub fn single_value(&self) -> Option<i32> {
        match self.palette {
            Palette::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn get(&self, index: usize) -> i32 {
        match &self.palette {
            Palette::Single(value) => *value,
            Palette::Indirect(ids) => ids
                .get(self.storage.get(index) as usize)
                .copied()
                .unwrap_or_default(),
            Palette::Direct => self.storage.get(index) as i32,
        }
    }

    pub fn get_at(&self, x: usize, y: usize, z: usize) -> i32 {
        self.get(self.kind.index(x, y, z))
    }

    pub fn set(&mut self, index: usize, value: i32) {
        if index >= self.kind.entries() {
            return;
        }
        match &mut self.palette {
            Palette::Single(current) if *current == value => return,
            Palette::Indirect(ids) => {
                if let Some(pos) = ids.iter().position(|&id| id == value) {
                    self.storage.set(index, pos as u32);
                    return;
                }
                if ids.len() < 1 << self.storage.bits() {
                    ids.push(value);
                    self.storage.set(index, (ids.len() - 1) as u32);
                    return;
                }
            }
            Palette::Direct => {
                self.storage.set(index, value as u32);
                return;
            }
            Palette::Single(_) => {}
        }
        self.grow();
        self.set(index, value);
    }

    /// Re-encode with room for one more palette entry.
    fn grow(&mut self) {
        let entries = self.kind.entries();
        let values: Vec<i32> = (0..entries).map(|i| self.get(i)).collect();
        let mut ids = match &self.palette {
            Palette::Single(value) => vec![*value],
            Palette::Indirect(ids) => ids.clone(),
            Palette::Direct => return,
        };
        let needed = ids.len() + 1;
        let bits = (usize::BITS - (needed - 1).leading_zeros()) as u8;

        match self.kind.layout(bits) {
            Layout::Indirect(storage_bits) => {
                let mut storage = BitStorage::new(storage_bits, entries);
                for (i, value) in values.iter().enumerate() {
                    let pos = ids.iter().position(|id| id == value).unwrap_or_else(|| {
                        ids.push(*value);
                        ids.len() - 1
                    });
                    storage.set(i, pos as u32);
                }
                self.palette = Palette::Indirect(ids);
                self.storage = storage;
            }
            Layout::Single | Layout::Direct(_) => {
                let mut storage = BitStorage::new(self.kind.direct_bits(), entries);
                for (i, value) in values.iter().enumerate() {
                    storage.set(i, *value as u32);
                }
                self.palette = Palette::Direct;
                self.storage = storage;
            }
        }
    }

    /// Number of entries matching `pred`.
    pub fn count(&self, pred: impl Fn(i32) -> bool) -> usize {
        (0..self.kind.entries()).filter(|&i| pred(self.get(i))).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn put_varint(buf: &mut BytesMut, v: i32) {
        VarInt(v).proto_encode(buf);
    }

    #[test]
    fn decode_single_valued() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        put_varint(&mut buf, 79);
        put_varint(&mut buf, 0);
        let c = PalettedContainer::read(ContainerKind::Blocks, &mut buf.freeze()).unwrap();
        assert_eq!(c.single_value(), Some(79));
        assert_eq!(c.get_at(15, 15, 15), 79);
    }

    #[test]
    fn decode_indirect_blocks_widens_to_four_bits() {
        // wire says 2 bits, block storage always uses 4
        let mut buf = BytesMut::new();
        buf.put_u8(2);
        put_varint(&mut buf, 3);
        for id in [0, 1, 9] {
            put_varint(&mut buf, id);
        }
        put_varint(&mut buf, 256);
        // first long: entries 0..16, entry 0 -> palette 1, entry 1 -> palette 2
        buf.put_u64(0x21);
        for _ in 1..256 {
            buf.put_u64(0);
        }
        let c = PalettedContainer::read(ContainerKind::Blocks, &mut buf.freeze()).unwrap();
        assert_eq!(c.bits(), 4);
        assert_eq!(c.get(0), 1);
        assert_eq!(c.get(1), 9);
        assert_eq!(c.get(2), 0);
        assert_eq!(c.get_at(0, 1, 0), 0);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 0);
        put_varint(&mut buf, 2);
        buf.put_u64(0);
        buf.put_u64(0);
        assert!(matches!(
            PalettedContainer::read(ContainerKind::Blocks, &mut buf.freeze()),
            Err(WorldError::DataLength { expected: 256, actual: 2 })
        ));
    }

    #[test]
    fn decode_rejects_index_outside_palette() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        put_varint(&mut buf, 1);
        put_varint(&mut buf, 4);
        // 1 bit biomes: 64 entries fit one long
        put_varint(&mut buf, 1);
        buf.put_u64(0b10);
        assert!(matches!(
            PalettedContainer::read(ContainerKind::Biomes, &mut buf.freeze()),
            Err(WorldError::InvalidPalette(_))
        ));
    }

    #[test]
    fn entries_never_span_longs() {
        // 5 bits: 12 entries per long, top 4 bits unused
        let mut s = BitStorage::new(5, 4096);
        assert_eq!(s.raw().len(), 4096usize.div_ceil(12));
        s.set(11, 31);
        s.set(12, 7);
        assert_eq!(s.raw()[0], 31 << 55);
        assert_eq!(s.raw()[1], 7);
        assert_eq!(s.get(11), 31);
        assert_eq!(s.get(12), 7);
    }

    #[test]
    fn set_grows_through_layouts() {
        let mut c = PalettedContainer::single(ContainerKind::Blocks, 0);
        c.set(5, 1);
        assert_eq!(c.bits(), 4);
        for id in 2..20 {
            c.set(id as usize, id);
        }
        assert_eq!(c.bits(), 5);
        for id in 20..300 {
            c.set(id as usize, id);
        }
        assert_eq!(c.bits(), ContainerKind::Blocks.direct_bits());
        assert_eq!(c.get(5), 1);
        assert_eq!(c.get(299), 299);
        assert_eq!(c.get(4000), 0);
    }

    #[test]
    fn write_then_read_preserves_entries() {
        let mut c = PalettedContainer::single(ContainerKind::Biomes, 3);
        c.set(ContainerKind::Biomes.index(1, 2, 3), 8);
        let mut buf = BytesMut::new();
        c.write(&mut buf);
        let back = PalettedContainer::read(ContainerKind::Biomes, &mut buf.freeze()).unwrap();
        assert_eq!(back, c);
        assert_eq!(back.get_at(1, 2, 3), 8);
        assert_eq!(back.count(|id| id == 3), 63);
    }
}

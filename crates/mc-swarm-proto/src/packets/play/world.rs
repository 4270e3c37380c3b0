//! Play-phase packets that describe terrain and world clock state.

use bytes::{Buf, Bytes};
use mc_swarm_nbt::NbtTag;

use crate::codec::{ensure_remaining, read_byte_array, read_len, read_nbt, ProtoDecode};
use crate::error::ProtoError;
use crate::frame::MAX_FRAME_SIZE;
use crate::types::{BlockPos, ChunkPos, SectionPos, VarInt, VarLong};

fn read_chunk_pos(buf: &mut impl Buf) -> Result<ChunkPos, ProtoError> {
    ensure_remaining(buf, 8)?;
    Ok(ChunkPos::from_key(buf.get_i64()))
}

/// Full chunk column. Block entities and light data trail `data` and are not
/// kept.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelChunkWithLight {
    pub pos: ChunkPos,
    pub heightmaps: Option<NbtTag>,
    /// Concatenated chunk sections, bottom to top.
    pub data: Bytes,
}

impl ProtoDecode for LevelChunkWithLight {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 8)?;
        let x = buf.get_i32();
        let z = buf.get_i32();
        Ok(Self {
            pos: ChunkPos::new(x, z),
            heightmaps: read_nbt(buf)?,
            data: read_byte_array(buf, MAX_FRAME_SIZE)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBiomeData {
    pub pos: ChunkPos,
    /// Biome containers of every section, bottom to top.
    pub data: Bytes,
}

impl ProtoDecode for ChunkBiomeData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            pos: read_chunk_pos(buf)?,
            data: read_byte_array(buf, MAX_FRAME_SIZE)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForgetLevelChunk {
    pub pos: ChunkPos,
}

impl ProtoDecode for ForgetLevelChunk {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            pos: read_chunk_pos(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockUpdate {
    pub pos: BlockPos,
    pub state: i32,
}

impl ProtoDecode for BlockUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            pos: BlockPos::proto_decode(buf)?,
            state: VarInt::proto_decode(buf)?.0,
        })
    }
}

/// Several block changes inside one 16x16x16 section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlocksUpdate {
    pub section: SectionPos,
    pub changes: Vec<(BlockPos, i32)>,
}

impl ProtoDecode for SectionBlocksUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 8)?;
        let section = SectionPos::unpack(buf.get_i64());
        let count = read_len(buf)?;
        let mut changes = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let entry = VarLong::proto_decode(buf)?.0;
            let local = (entry & 0xFFF) as u16;
            changes.push((section.relative_to_block_pos(local), (entry >> 12) as i32));
        }
        Ok(Self { section, changes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTime {
    pub game_time: i64,
    pub day_time: i64,
    pub tick_day_time: bool,
}

impl ProtoDecode for SetTime {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 16)?;
        Ok(Self {
            game_time: buf.get_i64(),
            day_time: buf.get_i64(),
            tick_day_time: bool::proto_decode(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetDefaultSpawnPosition {
    pub pos: BlockPos,
    pub angle: f32,
}

impl ProtoDecode for SetDefaultSpawnPosition {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let pos = BlockPos::proto_decode(buf)?;
        ensure_remaining(buf, 4)?;
        Ok(Self {
            pos,
            angle: buf.get_f32(),
        })
    }
}

/// Game event ids carried by [`GameEvent`].
pub mod game_event {
    pub const NO_RESPAWN_BLOCK_AVAILABLE: u8 = 0;
    pub const START_RAINING: u8 = 1;
    pub const STOP_RAINING: u8 = 2;
    pub const CHANGE_GAME_MODE: u8 = 3;
    pub const WIN_GAME: u8 = 4;
    pub const DEMO_EVENT: u8 = 5;
    pub const ARROW_HIT_PLAYER: u8 = 6;
    pub const RAIN_LEVEL_CHANGE: u8 = 7;
    pub const THUNDER_LEVEL_CHANGE: u8 = 8;
    pub const PUFFER_FISH_STING: u8 = 9;
    pub const GUARDIAN_ELDER_EFFECT: u8 = 10;
    pub const IMMEDIATE_RESPAWN: u8 = 11;
    pub const LIMITED_CRAFTING: u8 = 12;
    pub const LEVEL_CHUNKS_LOAD_START: u8 = 13;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameEvent {
    pub event: u8,
    pub param: f32,
}

impl ProtoDecode for GameEvent {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 5)?;
        Ok(Self {
            event: buf.get_u8(),
            param: buf.get_f32(),
        })
    }
}

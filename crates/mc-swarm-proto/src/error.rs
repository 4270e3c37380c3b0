//! Protocol-level errors.

use thiserror::Error;

use crate::packets::ProtocolState;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: need {needed} more bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("VarInt encoding error: {0}")]
    VarInt(#[from] crate::types::VarIntError),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("string of {len} chars exceeds limit of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("decompression error: {0}")]
    DecompressError(String),

    #[error("compression error: {0}")]
    CompressError(String),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("declared uncompressed length {declared} but got {actual}")]
    BadDataLength { declared: usize, actual: usize },

    #[error("compressed packet of {len} bytes is below threshold {threshold}")]
    BelowThreshold { len: usize, threshold: usize },

    #[error("unknown packet id 0x{id:02X} in {state} state")]
    UnknownPacketId { state: ProtocolState, id: u32 },

    #[error("NBT error: {0}")]
    Nbt(#[from] mc_swarm_nbt::NbtError),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

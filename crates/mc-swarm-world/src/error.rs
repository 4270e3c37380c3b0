use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("protocol error: {0}")]
    Proto(#[from] mc_swarm_proto::ProtoError),

    #[error("NBT error: {0}")]
    Nbt(#[from] mc_swarm_nbt::NbtError),

    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    #[error("data array has {actual} longs, expected {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("invalid dimension type {name}: {reason}")]
    InvalidDimension { name: String, reason: String },

    #[error("unknown dimension type {0}")]
    UnknownDimension(String),

    #[error("invalid block shape table: {0}")]
    InvalidShapes(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

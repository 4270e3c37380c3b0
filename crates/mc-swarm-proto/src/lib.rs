//! Minecraft Java Edition protocol types, framing and packet definitions.

pub mod codec;
pub mod compression;
pub mod error;
pub mod frame;
pub mod packets;
pub mod text;
pub mod types;

pub use error::ProtoError;

//! Client-side world model: geometry, chunk storage and per-dimension state.

pub mod block;
pub mod chunk;
pub mod dimension;
pub mod error;
pub mod geometry;
pub mod level;
pub mod palette;
pub mod section;
pub mod store;
pub mod tags;

pub use block::{BlockShapeTable, BlockState, CollisionShapeProvider};
pub use chunk::ChunkData;
pub use dimension::DimensionType;
pub use error::WorldError;
pub use level::{Level, LevelInfo};
pub use section::{ChunkSection, SectionInterner};
pub use store::{BlockAccessor, ChunkSnapshot, ChunkStore};
pub use tags::TagsState;

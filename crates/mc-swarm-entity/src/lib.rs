//! Client-side entity model: tracked entities with their attributes,
//! effects and metadata, plus the bot's own player physics.

pub mod attribute;
pub mod effect;
pub mod entity;
pub mod metadata;
pub mod player;
pub mod tracker;

pub use attribute::{Attribute, AttributeState, AttributeType};
pub use effect::{EffectData, EffectState};
pub use entity::{Entity, EntityDimensions};
pub use metadata::MetadataState;
pub use player::{LocalPlayer, MovementInput};
pub use tracker::{EntityRef, EntityTracker};

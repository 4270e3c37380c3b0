//! Synched entity data, keyed by metadata index.

use std::collections::HashMap;

use mc_swarm_proto::packets::play::entity::EntityDataValue;
use mc_swarm_proto::text::TextComponent;

/// Indices defined on the base entity class.
pub mod index {
    pub const SHARED_FLAGS: u8 = 0;
    pub const AIR_SUPPLY: u8 = 1;
    pub const CUSTOM_NAME: u8 = 2;
    pub const CUSTOM_NAME_VISIBLE: u8 = 3;
    pub const SILENT: u8 = 4;
    pub const NO_GRAVITY: u8 = 5;
    pub const POSE: u8 = 6;
    pub const TICKS_FROZEN: u8 = 7;
    // living entities
    pub const HEALTH: u8 = 9;
}

/// Bits of the shared flags byte.
pub mod shared_flag {
    pub const ON_FIRE: u8 = 0;
    pub const CROUCHING: u8 = 1;
    pub const SPRINTING: u8 = 3;
    pub const SWIMMING: u8 = 4;
    pub const INVISIBLE: u8 = 5;
    pub const GLOWING: u8 = 6;
    pub const FALL_FLYING: u8 = 7;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataState {
    values: HashMap<u8, EntityDataValue>,
}

impl MetadataState {
    pub fn set(&mut self, index: u8, value: EntityDataValue) {
        self.values.insert(index, value);
    }

    pub fn get(&self, index: u8) -> Option<&EntityDataValue> {
        self.values.get(&index)
    }

    pub fn apply(&mut self, items: &[(u8, EntityDataValue)]) {
        for (index, value) in items {
            self.set(*index, value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn byte(&self, index: u8) -> Option<i8> {
        match self.get(index)? {
            EntityDataValue::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn int(&self, index: u8) -> Option<i32> {
        match self.get(index)? {
            EntityDataValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, index: u8) -> Option<f32> {
        match self.get(index)? {
            EntityDataValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn boolean(&self, index: u8) -> Option<bool> {
        match self.get(index)? {
            EntityDataValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn shared_flag(&self, bit: u8) -> bool {
        self.byte(index::SHARED_FLAGS)
            .is_some_and(|flags| (flags as u8) & (1 << bit) != 0)
    }

    pub fn set_shared_flag(&mut self, bit: u8, value: bool) {
        let mut flags = self.byte(index::SHARED_FLAGS).unwrap_or(0) as u8;
        if value {
            flags |= 1 << bit;
        } else {
            flags &= !(1 << bit);
        }
        self.set(index::SHARED_FLAGS, EntityDataValue::Byte(flags as i8));
    }

    pub fn is_crouching(&self) -> bool {
        self.shared_flag(shared_flag::CROUCHING)
    }

    pub fn is_sprinting(&self) -> bool {
        self.shared_flag(shared_flag::SPRINTING)
    }

    pub fn is_invisible(&self) -> bool {
        self.shared_flag(shared_flag::INVISIBLE)
    }

    pub fn has_no_gravity(&self) -> bool {
        self.boolean(index::NO_GRAVITY).unwrap_or(false)
    }

    pub fn pose(&self) -> Option<i32> {
        match self.get(index::POSE)? {
            EntityDataValue::Pose(p) => Some(*p),
            _ => None,
        }
    }

    pub fn custom_name(&self) -> Option<&TextComponent> {
        match self.get(index::CUSTOM_NAME)? {
            EntityDataValue::OptionalComponent(name) => name.as_ref(),
            _ => None,
        }
    }

    pub fn health(&self) -> Option<f32> {
        self.float(index::HEALTH)
    }
}

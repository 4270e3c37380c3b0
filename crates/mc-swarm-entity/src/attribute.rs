//! Entity attributes and their modifiers.
//!
//! `value = clamp(((base + Σadd) + Σ(intermediate * multiply_base)) * Π(1 + multiply_total))`

use indexmap::IndexMap;
use mc_swarm_proto::packets::play::entity::AttributeSnapshot;
use mc_swarm_proto::types::Identifier;
use tracing::warn;

/// Static description of an attribute.
#[derive(Debug, PartialEq)]
pub struct AttributeType {
    pub id: i32,
    pub key: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl AttributeType {
    pub fn by_id(id: i32) -> Option<&'static AttributeType> {
        usize::try_from(id).ok().and_then(|i| ATTRIBUTES.get(i))
    }

    pub fn by_key(key: &str) -> Option<&'static AttributeType> {
        let path = key.strip_prefix("minecraft:").unwrap_or(key);
        ATTRIBUTES.iter().find(|a| a.key == path)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

macro_rules! attributes {
    ($($id:literal $name:ident $key:literal $default:literal $min:literal $max:literal;)*) => {
        /// Attribute registry in network id order.
        pub static ATTRIBUTES: &[AttributeType] = &[
            $(AttributeType { id: $id, key: $key, default: $default, min: $min, max: $max },)*
        ];

        pub mod attribute_id {
            $(pub const $name: i32 = $id;)*
        }
    };
}

attributes! {
    0 ARMOR "armor" 0.0 0.0 30.0;
    1 ARMOR_TOUGHNESS "armor_toughness" 0.0 0.0 20.0;
    2 ATTACK_DAMAGE "attack_damage" 2.0 0.0 2048.0;
    3 ATTACK_KNOCKBACK "attack_knockback" 0.0 0.0 5.0;
    4 ATTACK_SPEED "attack_speed" 4.0 0.0 1024.0;
    5 BLOCK_BREAK_SPEED "block_break_speed" 1.0 0.0 1024.0;
    6 BLOCK_INTERACTION_RANGE "block_interaction_range" 4.5 0.0 64.0;
    7 BURNING_TIME "burning_time" 1.0 0.0 1024.0;
    8 EXPLOSION_KNOCKBACK_RESISTANCE "explosion_knockback_resistance" 0.0 0.0 1.0;
    9 ENTITY_INTERACTION_RANGE "entity_interaction_range" 3.0 0.0 64.0;
    10 FALL_DAMAGE_MULTIPLIER "fall_damage_multiplier" 1.0 0.0 100.0;
    11 FLYING_SPEED "flying_speed" 0.4 0.0 1024.0;
    12 FOLLOW_RANGE "follow_range" 32.0 0.0 2048.0;
    13 GRAVITY "gravity" 0.08 -1.0 1.0;
    14 JUMP_STRENGTH "jump_strength" 0.42 0.0 32.0;
    15 KNOCKBACK_RESISTANCE "knockback_resistance" 0.0 0.0 1.0;
    16 LUCK "luck" 0.0 -1024.0 1024.0;
    17 MAX_ABSORPTION "max_absorption" 0.0 0.0 2048.0;
    18 MAX_HEALTH "max_health" 20.0 1.0 1024.0;
    19 MINING_EFFICIENCY "mining_efficiency" 0.0 0.0 1024.0;
    20 MOVEMENT_EFFICIENCY "movement_efficiency" 0.0 0.0 1.0;
    21 MOVEMENT_SPEED "movement_speed" 0.7 0.0 1024.0;
    22 OXYGEN_BONUS "oxygen_bonus" 0.0 0.0 1024.0;
    23 SAFE_FALL_DISTANCE "safe_fall_distance" 3.0 -1024.0 1024.0;
    24 SCALE "scale" 1.0 0.0625 16.0;
    25 SNEAKING_SPEED "sneaking_speed" 0.3 0.0 1.0;
    26 SPAWN_REINFORCEMENTS "spawn_reinforcements" 0.0 0.0 1.0;
    27 STEP_HEIGHT "step_height" 0.6 0.0 10.0;
    28 SUBMERGED_MINING_SPEED "submerged_mining_speed" 0.2 0.0 20.0;
    29 SWEEPING_DAMAGE_RATIO "sweeping_damage_ratio" 0.0 0.0 1.0;
    30 TEMPT_RANGE "tempt_range" 10.0 0.0 2048.0;
    31 WATER_MOVEMENT_EFFICIENCY "water_movement_efficiency" 0.0 0.0 1.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierOperation {
    AddValue,
    AddMultipliedBase,
    AddMultipliedTotal,
}

impl ModifierOperation {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::AddValue),
            1 => Some(Self::AddMultipliedBase),
            2 => Some(Self::AddMultipliedTotal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeModifier {
    pub id: Identifier,
    pub amount: f64,
    pub operation: ModifierOperation,
}

/// One attribute instance: base value plus modifiers in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    kind: &'static AttributeType,
    base: f64,
    modifiers: IndexMap<Identifier, AttributeModifier>,
}

impl Attribute {
    pub fn new(kind: &'static AttributeType) -> Self {
        Self {
            kind,
            base: kind.default,
            modifiers: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &'static AttributeType {
        self.kind
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = base;
    }

    /// Insert or replace a modifier; replacing keeps the original position.
    pub fn add_modifier(&mut self, modifier: AttributeModifier) {
        self.modifiers.insert(modifier.id.clone(), modifier);
    }

    pub fn remove_modifier(&mut self, id: &Identifier) -> Option<AttributeModifier> {
        self.modifiers.shift_remove(id)
    }

    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }

    pub fn modifiers(&self) -> impl Iterator<Item = &AttributeModifier> {
        self.modifiers.values()
    }

    fn with_operation(&self, op: ModifierOperation) -> impl Iterator<Item = f64> + '_ {
        self.modifiers
            .values()
            .filter(move |m| m.operation == op)
            .map(|m| m.amount)
    }

    pub fn calculate_value(&self) -> f64 {
        let intermediate = self.base + self.with_operation(ModifierOperation::AddValue).sum::<f64>();
        let mut value = intermediate;
        for amount in self.with_operation(ModifierOperation::AddMultipliedBase) {
            value += intermediate * amount;
        }
        for amount in self.with_operation(ModifierOperation::AddMultipliedTotal) {
            value *= 1.0 + amount;
        }
        self.kind.clamp(value)
    }
}

/// All attributes an entity has been told about, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeState {
    attributes: IndexMap<i32, Attribute>,
}

impl AttributeState {
    pub fn get(&self, kind: &AttributeType) -> Option<&Attribute> {
        self.attributes.get(&kind.id)
    }

    pub fn get_or_create(&mut self, kind: &'static AttributeType) -> &mut Attribute {
        self.attributes
            .entry(kind.id)
            .or_insert_with(|| Attribute::new(kind))
    }

    /// Current value, or the type's default when the server never sent it.
    pub fn value(&self, kind: &AttributeType) -> f64 {
        self.get(kind)
            .map(Attribute::calculate_value)
            .unwrap_or(kind.default)
    }

    pub fn value_of(&self, id: i32) -> Option<f64> {
        AttributeType::by_id(id).map(|kind| self.value(kind))
    }

    /// Replace base and modifiers from an attribute update.
    pub fn apply(&mut self, snapshot: &AttributeSnapshot) {
        let Some(kind) = AttributeType::by_id(snapshot.attribute) else {
            warn!("Received unknown attribute type {}", snapshot.attribute);
            return;
        };
        let attribute = self.get_or_create(kind);
        attribute.set_base(snapshot.base);
        attribute.clear_modifiers();
        for modifier in &snapshot.modifiers {
            let Some(operation) = ModifierOperation::from_id(modifier.operation) else {
                warn!(
                    "Skipping modifier {} with unknown operation {}",
                    modifier.id, modifier.operation
                );
                continue;
            };
            attribute.add_modifier(AttributeModifier {
                id: modifier.id.clone(),
                amount: modifier.amount,
                operation,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

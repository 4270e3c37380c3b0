//! Active mob effects as reported by the server.

use std::collections::HashMap;

use mc_swarm_proto::packets::play::entity::{effect_flags, UpdateMobEffect};

/// Mob effect registry keys in network id order.
pub static EFFECTS: &[&str] = &[
    "speed",
    "slowness",
    "haste",
    "mining_fatigue",
    "strength",
    "instant_health",
    "instant_damage",
    "jump_boost",
    "nausea",
    "regeneration",
    "resistance",
    "fire_resistance",
    "water_breathing",
    "invisibility",
    "blindness",
    "night_vision",
    "hunger",
    "weakness",
    "poison",
    "wither",
    "health_boost",
    "absorption",
    "saturation",
    "glowing",
    "levitation",
    "luck",
    "unluck",
    "slow_falling",
    "conduit_power",
    "dolphins_grace",
    "bad_omen",
    "hero_of_the_village",
    "darkness",
    "trial_omen",
    "raid_omen",
    "wind_charged",
    "weaving",
    "oozing",
    "infested",
];

pub mod effect_id {
    pub const SPEED: i32 = 0;
    pub const SLOWNESS: i32 = 1;
    pub const JUMP_BOOST: i32 = 7;
    pub const LEVITATION: i32 = 24;
    pub const SLOW_FALLING: i32 = 27;
}

pub fn effect_key(id: i32) -> Option<&'static str> {
    usize::try_from(id).ok().and_then(|i| EFFECTS.get(i).copied())
}

/// Duration value meaning "never expires".
pub const INFINITE_DURATION: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectData {
    pub amplifier: i32,
    pub duration: i32,
    pub ambient: bool,
    pub visible: bool,
    pub show_icon: bool,
    pub blend: bool,
}

impl EffectData {
    pub fn is_infinite(&self) -> bool {
        self.duration == INFINITE_DURATION
    }
}

impl From<&UpdateMobEffect> for EffectData {
    fn from(p: &UpdateMobEffect) -> Self {
        Self {
            amplifier: p.amplifier,
            duration: p.duration,
            ambient: p.flags & effect_flags::AMBIENT != 0,
            visible: p.flags & effect_flags::VISIBLE != 0,
            show_icon: p.flags & effect_flags::SHOW_ICON != 0,
            blend: p.flags & effect_flags::BLEND != 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectState {
    effects: HashMap<i32, EffectData>,
}

impl EffectState {
    pub fn update(&mut self, effect: i32, data: EffectData) {
        self.effects.insert(effect, data);
    }

    pub fn remove(&mut self, effect: i32) -> Option<EffectData> {
        self.effects.remove(&effect)
    }

    pub fn get(&self, effect: i32) -> Option<&EffectData> {
        self.effects.get(&effect)
    }

    pub fn has(&self, effect: i32) -> bool {
        self.effects.contains_key(&effect)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Count every finite effect down by one tick, dropping the expired ones.
    pub fn tick(&mut self) {
        self.effects.retain(|_, data| {
            if data.is_infinite() {
                return true;
            }
            data.duration -= 1;
            data.duration > 0
        });
    }
}

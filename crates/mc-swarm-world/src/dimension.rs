//! Dimension types from the `minecraft:dimension_type` registry.

use mc_swarm_nbt::{NbtCompound, NbtTag};

use crate::error::WorldError;

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionType {
    pub min_y: i32,
    pub height: i32,
    pub logical_height: i32,
    pub has_skylight: bool,
    pub has_ceiling: bool,
    pub ultrawarm: bool,
    pub natural: bool,
    pub coordinate_scale: f64,
    pub bed_works: bool,
    pub respawn_anchor_works: bool,
    pub piglin_safe: bool,
    pub has_raids: bool,
    pub ambient_light: f32,
    /// Only set for dimensions with a frozen sun (nether, end).
    pub fixed_time: Option<i64>,
    pub infiniburn: String,
    pub effects: String,
    pub monster_spawn_block_light_limit: i32,
}

impl DimensionType {
    /// Vanilla overworld.
    pub fn overworld() -> Self {
        Self {
            min_y: -64,
            height: 384,
            logical_height: 384,
            has_skylight: true,
            has_ceiling: false,
            ultrawarm: false,
            natural: true,
            coordinate_scale: 1.0,
            bed_works: true,
            respawn_anchor_works: false,
            piglin_safe: false,
            has_raids: true,
            ambient_light: 0.0,
            fixed_time: None,
            infiniburn: "#minecraft:infiniburn_overworld".into(),
            effects: "minecraft:overworld".into(),
            monster_spawn_block_light_limit: 0,
        }
    }

    /// Build from a registry entry payload.
    pub fn from_nbt(name: &str, tag: &NbtTag) -> Result<Self, WorldError> {
        let invalid = |reason: String| WorldError::InvalidDimension {
            name: name.to_string(),
            reason,
        };
        let c = tag
            .as_compound()
            .ok_or_else(|| invalid(format!("expected compound, got {tag}")))?;

        let int = |key: &str| -> Result<i32, WorldError> {
            c.get(key)
                .and_then(NbtTag::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| invalid(format!("missing or invalid {key}")))
        };
        let flag = |key: &str| read_flag(c, key);
        let string = |key: &str, default: &str| {
            c.get(key)
                .and_then(NbtTag::as_string)
                .unwrap_or(default)
                .to_string()
        };

        let height = int("height")?;
        if height <= 0 || height % 16 != 0 {
            return Err(invalid(format!("height {height} is not a positive multiple of 16")));
        }
        let min_y = int("min_y")?;
        if min_y % 16 != 0 {
            return Err(invalid(format!("min_y {min_y} is not a multiple of 16")));
        }

        Ok(Self {
            min_y,
            height,
            logical_height: int("logical_height").unwrap_or(height),
            has_skylight: flag("has_skylight"),
            has_ceiling: flag("has_ceiling"),
            ultrawarm: flag("ultrawarm"),
            natural: flag("natural"),
            coordinate_scale: c
                .get("coordinate_scale")
                .and_then(NbtTag::as_f64)
                .unwrap_or(1.0),
            bed_works: flag("bed_works"),
            respawn_anchor_works: flag("respawn_anchor_works"),
            piglin_safe: flag("piglin_safe"),
            has_raids: flag("has_raids"),
            ambient_light: c
                .get("ambient_light")
                .and_then(NbtTag::as_f64)
                .unwrap_or(0.0) as f32,
            fixed_time: c.get("fixed_time").and_then(NbtTag::as_i64),
            infiniburn: string("infiniburn", ""),
            effects: string("effects", "minecraft:overworld"),
            monster_spawn_block_light_limit: int("monster_spawn_block_light_limit").unwrap_or(0),
        })
    }

    pub fn max_y(&self) -> i32 {
        self.min_y + self.height
    }
}

fn read_flag(c: &NbtCompound, key: &str) -> bool {
    c.get(key).and_then(NbtTag::as_bool).unwrap_or(false)
}

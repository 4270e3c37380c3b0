//! Play-phase packets about non-player entities and their sub-state.

use bytes::Buf;
use uuid::Uuid;

use crate::codec::{ensure_remaining, read_len, read_list, read_nbt, read_string, ProtoDecode};
use crate::error::ProtoError;
use crate::packets::play::player::PositionMoveRotation;
use crate::text::TextComponent;
use crate::types::{Angle, BlockPos, Identifier, VarInt, VarLong};

/// Velocity shorts are in 1/8000 blocks per tick.
const VELOCITY_SCALE: f64 = 8000.0;
/// Relative move shorts are in 1/4096 blocks.
const DELTA_SCALE: f64 = 4096.0;

fn read_velocity(buf: &mut impl Buf) -> Result<[f64; 3], ProtoError> {
    ensure_remaining(buf, 6)?;
    Ok([
        buf.get_i16() as f64 / VELOCITY_SCALE,
        buf.get_i16() as f64 / VELOCITY_SCALE,
        buf.get_i16() as f64 / VELOCITY_SCALE,
    ])
}

fn read_id(buf: &mut impl Buf) -> Result<i32, ProtoError> {
    Ok(VarInt::proto_decode(buf)?.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddEntity {
    pub id: i32,
    pub uuid: Uuid,
    pub entity_type: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: Angle,
    pub yaw: Angle,
    pub head_yaw: Angle,
    pub data: i32,
    pub velocity: [f64; 3],
}

impl ProtoDecode for AddEntity {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = read_id(buf)?;
        let uuid = Uuid::proto_decode(buf)?;
        let entity_type = read_id(buf)?;
        ensure_remaining(buf, 24)?;
        let (x, y, z) = (buf.get_f64(), buf.get_f64(), buf.get_f64());
        Ok(Self {
            id,
            uuid,
            entity_type,
            x,
            y,
            z,
            pitch: Angle::proto_decode(buf)?,
            yaw: Angle::proto_decode(buf)?,
            head_yaw: Angle::proto_decode(buf)?,
            data: read_id(buf)?,
            velocity: read_velocity(buf)?,
        })
    }
}

/// Relative entity move. Position deltas are already scaled to blocks; the
/// rotation is present only for the rotating variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveEntity {
    pub id: i32,
    pub delta: Option<[f64; 3]>,
    pub rotation: Option<(Angle, Angle)>,
    pub on_ground: bool,
}

impl MoveEntity {
    fn decode(buf: &mut impl Buf, has_pos: bool, has_rot: bool) -> Result<Self, ProtoError> {
        let id = read_id(buf)?;
        let delta = if has_pos {
            ensure_remaining(buf, 6)?;
            Some([
                buf.get_i16() as f64 / DELTA_SCALE,
                buf.get_i16() as f64 / DELTA_SCALE,
                buf.get_i16() as f64 / DELTA_SCALE,
            ])
        } else {
            None
        };
        let rotation = if has_rot {
            let yaw = Angle::proto_decode(buf)?;
            let pitch = Angle::proto_decode(buf)?;
            Some((yaw, pitch))
        } else {
            None
        };
        Ok(Self {
            id,
            delta,
            rotation,
            on_ground: bool::proto_decode(buf)?,
        })
    }

    pub fn decode_pos(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Self::decode(buf, true, false)
    }

    pub fn decode_pos_rot(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Self::decode(buf, true, true)
    }

    pub fn decode_rot(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Self::decode(buf, false, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateHead {
    pub id: i32,
    pub head_yaw: Angle,
}

impl ProtoDecode for RotateHead {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: read_id(buf)?,
            head_yaw: Angle::proto_decode(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetEntityMotion {
    pub id: i32,
    pub velocity: [f64; 3],
}

impl ProtoDecode for SetEntityMotion {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: read_id(buf)?,
            velocity: read_velocity(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeleportEntity {
    pub id: i32,
    pub change: PositionMoveRotation,
    pub relatives: i32,
    pub on_ground: bool,
}

impl ProtoDecode for TeleportEntity {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = read_id(buf)?;
        let change = PositionMoveRotation::proto_decode(buf)?;
        ensure_remaining(buf, 4)?;
        Ok(Self {
            id,
            change,
            relatives: buf.get_i32(),
            on_ground: bool::proto_decode(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityEvent {
    pub id: i32,
    pub event: i8,
}

impl ProtoDecode for EntityEvent {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 5)?;
        Ok(Self {
            id: buf.get_i32(),
            event: buf.get_i8(),
        })
    }
}

// ---------------------------------------------------------------------------
// Entity metadata
// ---------------------------------------------------------------------------

/// Decoded metadata value. Only serializers with a fixed, self-contained
/// layout are modelled.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDataValue {
    Byte(i8),
    Int(i32),
    Long(i64),
    Float(f32),
    String(String),
    Component(TextComponent),
    OptionalComponent(Option<TextComponent>),
    Boolean(bool),
    Rotations([f32; 3]),
    BlockPos(BlockPos),
    OptionalBlockPos(Option<BlockPos>),
    Direction(i32),
    OptionalUuid(Option<Uuid>),
    BlockState(i32),
    /// 0 means absent.
    OptionalBlockState(i32),
    CompoundTag(Option<mc_swarm_nbt::NbtTag>),
    VillagerData { kind: i32, profession: i32, level: i32 },
    /// Stored as `value + 1`, 0 means absent.
    OptionalUnsignedInt(Option<u32>),
    Pose(i32),
    CatVariant(i32),
    FrogVariant(i32),
    SnifferState(i32),
    ArmadilloState(i32),
    Vector3([f32; 3]),
    Quaternion([f32; 4]),
}

/// Serializer ids in registration order.
pub mod serializer {
    pub const BYTE: i32 = 0;
    pub const INT: i32 = 1;
    pub const LONG: i32 = 2;
    pub const FLOAT: i32 = 3;
    pub const STRING: i32 = 4;
    pub const COMPONENT: i32 = 5;
    pub const OPTIONAL_COMPONENT: i32 = 6;
    pub const ITEM_STACK: i32 = 7;
    pub const BOOLEAN: i32 = 8;
    pub const ROTATIONS: i32 = 9;
    pub const BLOCK_POS: i32 = 10;
    pub const OPTIONAL_BLOCK_POS: i32 = 11;
    pub const DIRECTION: i32 = 12;
    pub const OPTIONAL_UUID: i32 = 13;
    pub const BLOCK_STATE: i32 = 14;
    pub const OPTIONAL_BLOCK_STATE: i32 = 15;
    pub const COMPOUND_TAG: i32 = 16;
    pub const PARTICLE: i32 = 17;
    pub const PARTICLES: i32 = 18;
    pub const VILLAGER_DATA: i32 = 19;
    pub const OPTIONAL_UNSIGNED_INT: i32 = 20;
    pub const POSE: i32 = 21;
    pub const CAT_VARIANT: i32 = 22;
    pub const WOLF_VARIANT: i32 = 23;
    pub const FROG_VARIANT: i32 = 24;
    pub const OPTIONAL_GLOBAL_POS: i32 = 25;
    pub const PAINTING_VARIANT: i32 = 26;
    pub const SNIFFER_STATE: i32 = 27;
    pub const ARMADILLO_STATE: i32 = 28;
    pub const VECTOR3: i32 = 29;
    pub const QUATERNION: i32 = 30;
}

fn read_floats<const N: usize>(buf: &mut impl Buf) -> Result<[f32; N], ProtoError> {
    ensure_remaining(buf, 4 * N)?;
    let mut out = [0.0; N];
    for v in &mut out {
        *v = buf.get_f32();
    }
    Ok(out)
}

impl EntityDataValue {
    /// Decode one value, or `None` when the serializer is not modelled.
    fn decode(serializer: i32, buf: &mut impl Buf) -> Result<Option<Self>, ProtoError> {
        use self::serializer as s;
        let value = match serializer {
            s::BYTE => {
                ensure_remaining(buf, 1)?;
                Self::Byte(buf.get_i8())
            }
            s::INT => Self::Int(read_id(buf)?),
            s::LONG => Self::Long(VarLong::proto_decode(buf)?.0),
            s::FLOAT => Self::Float(read_floats::<1>(buf)?[0]),
            s::STRING => Self::String(read_string(buf, 32767)?),
            s::COMPONENT => Self::Component(TextComponent::proto_decode(buf)?),
            s::OPTIONAL_COMPONENT => Self::OptionalComponent(if bool::proto_decode(buf)? {
                Some(TextComponent::proto_decode(buf)?)
            } else {
                None
            }),
            s::BOOLEAN => Self::Boolean(bool::proto_decode(buf)?),
            s::ROTATIONS => Self::Rotations(read_floats::<3>(buf)?),
            s::BLOCK_POS => Self::BlockPos(BlockPos::proto_decode(buf)?),
            s::OPTIONAL_BLOCK_POS => Self::OptionalBlockPos(if bool::proto_decode(buf)? {
                Some(BlockPos::proto_decode(buf)?)
            } else {
                None
            }),
            s::DIRECTION => Self::Direction(read_id(buf)?),
            s::OPTIONAL_UUID => Self::OptionalUuid(if bool::proto_decode(buf)? {
                Some(Uuid::proto_decode(buf)?)
            } else {
                None
            }),
            s::BLOCK_STATE => Self::BlockState(read_id(buf)?),
            s::OPTIONAL_BLOCK_STATE => Self::OptionalBlockState(read_id(buf)?),
            s::COMPOUND_TAG => Self::CompoundTag(read_nbt(buf)?),
            s::VILLAGER_DATA => Self::VillagerData {
                kind: read_id(buf)?,
                profession: read_id(buf)?,
                level: read_id(buf)?,
            },
            s::OPTIONAL_UNSIGNED_INT => {
                let raw = read_id(buf)?;
                Self::OptionalUnsignedInt(if raw == 0 { None } else { Some(raw as u32 - 1) })
            }
            s::POSE => Self::Pose(read_id(buf)?),
            s::CAT_VARIANT => Self::CatVariant(read_id(buf)?),
            s::FROG_VARIANT => Self::FrogVariant(read_id(buf)?),
            s::SNIFFER_STATE => Self::SnifferState(read_id(buf)?),
            s::ARMADILLO_STATE => Self::ArmadilloState(read_id(buf)?),
            s::VECTOR3 => Self::Vector3(read_floats::<3>(buf)?),
            s::QUATERNION => Self::Quaternion(read_floats::<4>(buf)?),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Metadata update. `complete` is false when decoding stopped at a value
/// whose layout is not modelled; the items before it are still valid.
#[derive(Debug, Clone, PartialEq)]
pub struct SetEntityData {
    pub id: i32,
    pub items: Vec<(u8, EntityDataValue)>,
    pub complete: bool,
}

impl ProtoDecode for SetEntityData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = read_id(buf)?;
        let mut items = Vec::new();
        loop {
            ensure_remaining(buf, 1)?;
            let index = buf.get_u8();
            if index == 0xFF {
                return Ok(Self {
                    id,
                    items,
                    complete: true,
                });
            }
            let serializer = read_id(buf)?;
            match EntityDataValue::decode(serializer, buf)? {
                Some(value) => items.push((index, value)),
                None => {
                    return Ok(Self {
                        id,
                        items,
                        complete: false,
                    })
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Attributes and effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierData {
    pub id: Identifier,
    pub amount: f64,
    /// 0 add value, 1 add multiplied base, 2 add multiplied total.
    pub operation: i32,
}

impl ProtoDecode for ModifierData {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = Identifier::proto_decode(buf)?;
        ensure_remaining(buf, 8)?;
        Ok(Self {
            id,
            amount: buf.get_f64(),
            operation: read_id(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    /// Attribute registry id.
    pub attribute: i32,
    pub base: f64,
    pub modifiers: Vec<ModifierData>,
}

impl ProtoDecode for AttributeSnapshot {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let attribute = read_id(buf)?;
        ensure_remaining(buf, 8)?;
        Ok(Self {
            attribute,
            base: buf.get_f64(),
            modifiers: read_list(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAttributes {
    pub id: i32,
    pub attributes: Vec<AttributeSnapshot>,
}

impl ProtoDecode for UpdateAttributes {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: read_id(buf)?,
            attributes: read_list(buf)?,
        })
    }
}

/// Effect flag bits.
pub mod effect_flags {
    pub const AMBIENT: u8 = 0x01;
    pub const VISIBLE: u8 = 0x02;
    pub const SHOW_ICON: u8 = 0x04;
    pub const BLEND: u8 = 0x08;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateMobEffect {
    pub id: i32,
    pub effect: i32,
    pub amplifier: i32,
    /// Ticks remaining, -1 for infinite.
    pub duration: i32,
    pub flags: u8,
}

impl ProtoDecode for UpdateMobEffect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = read_id(buf)?;
        let effect = read_id(buf)?;
        let amplifier = read_id(buf)?;
        let duration = read_id(buf)?;
        ensure_remaining(buf, 1)?;
        Ok(Self {
            id,
            effect,
            amplifier,
            duration,
            flags: buf.get_u8(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveMobEffect {
    pub id: i32,
    pub effect: i32,
}

impl ProtoDecode for RemoveMobEffect {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: read_id(buf)?,
            effect: read_id(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveEntities {
    pub ids: Vec<i32>,
}

impl ProtoDecode for RemoveEntities {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let len = read_len(buf)?;
        let mut ids = Vec::with_capacity(len.min(buf.remaining()));
        for _ in 0..len {
            ids.push(read_id(buf)?);
        }
        Ok(Self { ids })
    }
}

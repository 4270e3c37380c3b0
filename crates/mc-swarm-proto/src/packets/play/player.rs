//! Play-phase packets about the local player, its level and the player list.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::codec::{ensure_remaining, read_byte_array, read_len, read_list, read_string};
use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::login::ProfileProperty;
use crate::text::TextComponent;
use crate::types::{BlockPos, Identifier, VarInt};

/// Absolute or relative movement as carried by teleport packets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionMoveRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl ProtoDecode for PositionMoveRotation {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 56)?;
        Ok(Self {
            x: buf.get_f64(),
            y: buf.get_f64(),
            z: buf.get_f64(),
            dx: buf.get_f64(),
            dy: buf.get_f64(),
            dz: buf.get_f64(),
            yaw: buf.get_f32(),
            pitch: buf.get_f32(),
        })
    }
}

/// Bits of the relative-movement set sent with teleports.
pub mod relative {
    pub const X: i32 = 1 << 0;
    pub const Y: i32 = 1 << 1;
    pub const Z: i32 = 1 << 2;
    pub const Y_ROT: i32 = 1 << 3;
    pub const X_ROT: i32 = 1 << 4;
    pub const DELTA_X: i32 = 1 << 5;
    pub const DELTA_Y: i32 = 1 << 6;
    pub const DELTA_Z: i32 = 1 << 7;
    pub const ROTATE_DELTA: i32 = 1 << 8;
}

/// Dimension description shared by `Login` and `Respawn`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonPlayerSpawnInfo {
    /// Index into the `dimension_type` registry.
    pub dimension_type: i32,
    pub dimension: Identifier,
    pub hashed_seed: i64,
    pub game_mode: u8,
    /// -1 when there is none.
    pub previous_game_mode: i8,
    pub is_debug: bool,
    pub is_flat: bool,
    pub last_death_location: Option<(Identifier, BlockPos)>,
    pub portal_cooldown: i32,
    pub sea_level: i32,
}

impl ProtoDecode for CommonPlayerSpawnInfo {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let dimension_type = VarInt::proto_decode(buf)?.0;
        let dimension = Identifier::proto_decode(buf)?;
        ensure_remaining(buf, 10)?;
        let hashed_seed = buf.get_i64();
        let game_mode = buf.get_u8();
        let previous_game_mode = buf.get_i8();
        let is_debug = bool::proto_decode(buf)?;
        let is_flat = bool::proto_decode(buf)?;
        let last_death_location = if bool::proto_decode(buf)? {
            Some((Identifier::proto_decode(buf)?, BlockPos::proto_decode(buf)?))
        } else {
            None
        };
        Ok(Self {
            dimension_type,
            dimension,
            hashed_seed,
            game_mode,
            previous_game_mode,
            is_debug,
            is_flat,
            last_death_location,
            portal_cooldown: VarInt::proto_decode(buf)?.0,
            sea_level: VarInt::proto_decode(buf)?.0,
        })
    }
}

/// Join game.
#[derive(Debug, Clone, PartialEq)]
pub struct Login {
    pub player_id: i32,
    pub hardcore: bool,
    pub levels: Vec<Identifier>,
    pub max_players: i32,
    pub chunk_radius: i32,
    pub simulation_distance: i32,
    pub reduced_debug_info: bool,
    pub show_death_screen: bool,
    pub do_limited_crafting: bool,
    pub common: CommonPlayerSpawnInfo,
    pub enforces_secure_chat: bool,
}

impl ProtoDecode for Login {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 5)?;
        let player_id = buf.get_i32();
        let hardcore = bool::proto_decode(buf)?;
        Ok(Self {
            player_id,
            hardcore,
            levels: read_list(buf)?,
            max_players: VarInt::proto_decode(buf)?.0,
            chunk_radius: VarInt::proto_decode(buf)?.0,
            simulation_distance: VarInt::proto_decode(buf)?.0,
            reduced_debug_info: bool::proto_decode(buf)?,
            show_death_screen: bool::proto_decode(buf)?,
            do_limited_crafting: bool::proto_decode(buf)?,
            common: CommonPlayerSpawnInfo::proto_decode(buf)?,
            enforces_secure_chat: bool::proto_decode(buf)?,
        })
    }
}

/// Bits of `Respawn::data_to_keep`.
pub mod keep {
    pub const ATTRIBUTES: u8 = 0x01;
    pub const ENTITY_DATA: u8 = 0x02;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Respawn {
    pub common: CommonPlayerSpawnInfo,
    pub data_to_keep: u8,
}

impl ProtoDecode for Respawn {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let common = CommonPlayerSpawnInfo::proto_decode(buf)?;
        ensure_remaining(buf, 1)?;
        Ok(Self {
            common,
            data_to_keep: buf.get_u8(),
        })
    }
}

/// Server-side position correction that must be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPosition {
    pub teleport_id: i32,
    pub change: PositionMoveRotation,
    pub relatives: i32,
}

impl ProtoDecode for PlayerPosition {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let teleport_id = VarInt::proto_decode(buf)?.0;
        let change = PositionMoveRotation::proto_decode(buf)?;
        ensure_remaining(buf, 4)?;
        Ok(Self {
            teleport_id,
            change,
            relatives: buf.get_i32(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetHealth {
    pub health: f32,
    pub food: i32,
    pub saturation: f32,
}

impl ProtoDecode for SetHealth {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 4)?;
        let health = buf.get_f32();
        let food = VarInt::proto_decode(buf)?.0;
        ensure_remaining(buf, 4)?;
        Ok(Self {
            health,
            food,
            saturation: buf.get_f32(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetExperience {
    pub progress: f32,
    pub level: i32,
    pub total: i32,
}

impl ProtoDecode for SetExperience {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 4)?;
        Ok(Self {
            progress: buf.get_f32(),
            level: VarInt::proto_decode(buf)?.0,
            total: VarInt::proto_decode(buf)?.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerCombatKill {
    pub player_id: i32,
    pub message: TextComponent,
}

impl ProtoDecode for PlayerCombatKill {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            player_id: VarInt::proto_decode(buf)?.0,
            message: TextComponent::proto_decode(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemChat {
    pub content: TextComponent,
    /// Shown above the hotbar instead of in chat.
    pub overlay: bool,
}

impl ProtoDecode for SystemChat {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            content: TextComponent::proto_decode(buf)?,
            overlay: bool::proto_decode(buf)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Player list
// ---------------------------------------------------------------------------

/// Player-list action bits.
pub mod info_action {
    pub const ADD_PLAYER: u8 = 0x01;
    pub const INITIALIZE_CHAT: u8 = 0x02;
    pub const UPDATE_GAME_MODE: u8 = 0x04;
    pub const UPDATE_LISTED: u8 = 0x08;
    pub const UPDATE_LATENCY: u8 = 0x10;
    pub const UPDATE_DISPLAY_NAME: u8 = 0x20;
    pub const UPDATE_LIST_ORDER: u8 = 0x40;
    pub const UPDATE_HAT: u8 = 0x80;
}

/// Fields present for one player, according to the packet's action set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerInfoEntry {
    pub profile_id: Uuid,
    pub name: Option<String>,
    pub properties: Vec<ProfileProperty>,
    pub game_mode: Option<i32>,
    pub listed: Option<bool>,
    pub latency: Option<i32>,
    pub display_name: Option<Option<TextComponent>>,
    pub list_order: Option<i32>,
    pub show_hat: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfoUpdate {
    pub actions: u8,
    pub entries: Vec<PlayerInfoEntry>,
}

fn skip_chat_session(buf: &mut impl Buf) -> Result<(), ProtoError> {
    if bool::proto_decode(buf)? {
        Uuid::proto_decode(buf)?;
        ensure_remaining(buf, 8)?;
        buf.advance(8);
        read_byte_array(buf, 512)?;
        read_byte_array(buf, 4096)?;
    }
    Ok(())
}

impl ProtoDecode for PlayerInfoUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        use self::info_action as a;
        ensure_remaining(buf, 1)?;
        let actions = buf.get_u8();
        let count = read_len(buf)?;
        let mut entries = Vec::with_capacity(count.min(buf.remaining() / 16));
        for _ in 0..count {
            let mut entry = PlayerInfoEntry {
                profile_id: Uuid::proto_decode(buf)?,
                ..Default::default()
            };
            if actions & a::ADD_PLAYER != 0 {
                entry.name = Some(read_string(buf, 16)?);
                entry.properties = read_list(buf)?;
            }
            if actions & a::INITIALIZE_CHAT != 0 {
                skip_chat_session(buf)?;
            }
            if actions & a::UPDATE_GAME_MODE != 0 {
                entry.game_mode = Some(VarInt::proto_decode(buf)?.0);
            }
            if actions & a::UPDATE_LISTED != 0 {
                entry.listed = Some(bool::proto_decode(buf)?);
            }
            if actions & a::UPDATE_LATENCY != 0 {
                entry.latency = Some(VarInt::proto_decode(buf)?.0);
            }
            if actions & a::UPDATE_DISPLAY_NAME != 0 {
                entry.display_name = Some(if bool::proto_decode(buf)? {
                    Some(TextComponent::proto_decode(buf)?)
                } else {
                    None
                });
            }
            if actions & a::UPDATE_LIST_ORDER != 0 {
                entry.list_order = Some(VarInt::proto_decode(buf)?.0);
            }
            if actions & a::UPDATE_HAT != 0 {
                entry.show_hat = Some(bool::proto_decode(buf)?);
            }
            entries.push(entry);
        }
        Ok(Self { actions, entries })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfoRemove {
    pub profile_ids: Vec<Uuid>,
}

impl ProtoDecode for PlayerInfoRemove {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            profile_ids: read_list(buf)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Serverbound movement
// ---------------------------------------------------------------------------

/// Movement flag bits.
pub mod move_flags {
    pub const ON_GROUND: u8 = 0x01;
    pub const HORIZONTAL_COLLISION: u8 = 0x02;
}

/// Player movement report. Which fields are present selects the packet id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlayer {
    pub position: Option<[f64; 3]>,
    pub rotation: Option<(f32, f32)>,
    pub on_ground: bool,
    pub horizontal_collision: bool,
}

impl MovePlayer {
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.on_ground {
            flags |= move_flags::ON_GROUND;
        }
        if self.horizontal_collision {
            flags |= move_flags::HORIZONTAL_COLLISION;
        }
        flags
    }
}

impl ProtoEncode for MovePlayer {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        if let Some([x, y, z]) = self.position {
            buf.put_f64(x);
            buf.put_f64(y);
            buf.put_f64(z);
        }
        if let Some((yaw, pitch)) = self.rotation {
            buf.put_f32(yaw);
            buf.put_f32(pitch);
        }
        buf.put_u8(self.flags());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_string;
    use bytes::BytesMut;

    fn spawn_info(buf: &mut BytesMut) {
        VarInt(0).proto_encode(buf);
        write_string(buf, "minecraft:overworld");
        buf.put_i64(-123);
        buf.put_u8(0);
        buf.put_i8(-1);
        buf.put_u8(0);
        buf.put_u8(1);
        buf.put_u8(0);
        VarInt(0).proto_encode(buf);
        VarInt(63).proto_encode(buf);
    }

    #[test]
    fn decode_login() {
        let mut buf = BytesMut::new();
        buf.put_i32(17);
        buf.put_u8(0);
        VarInt(1).proto_encode(&mut buf);
        write_string(&mut buf, "minecraft:overworld");
        VarInt(20).proto_encode(&mut buf);
        VarInt(10).proto_encode(&mut buf);
        VarInt(8).proto_encode(&mut buf);
        buf.put_u8(0);
        buf.put_u8(1);
        buf.put_u8(0);
        spawn_info(&mut buf);
        buf.put_u8(1);

        let login = Login::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(login.player_id, 17);
        assert_eq!(login.levels, vec![Identifier::vanilla("overworld")]);
        assert_eq!(login.chunk_radius, 10);
        assert_eq!(login.simulation_distance, 8);
        assert!(login.show_death_screen);
        assert_eq!(login.common.dimension.path, "overworld");
        assert_eq!(login.common.hashed_seed, -123);
        assert_eq!(login.common.previous_game_mode, -1);
        assert!(login.common.is_flat);
        assert_eq!(login.common.sea_level, 63);
        assert!(login.enforces_secure_chat);
    }

    #[test]
    fn decode_player_position() {
        let mut buf = BytesMut::new();
        VarInt(4).proto_encode(&mut buf);
        for v in [10.5, 70.0, -5.5, 0.0, 0.0, 0.0] {
            buf.put_f64(v);
        }
        buf.put_f32(90.0);
        buf.put_f32(0.0);
        buf.put_i32(relative::Y_ROT | relative::X_ROT);
        let pkt = PlayerPosition::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(pkt.teleport_id, 4);
        assert_eq!(pkt.change.x, 10.5);
        assert_eq!(pkt.change.yaw, 90.0);
        assert_eq!(pkt.relatives, 0b11000);
    }

    #[test]
    fn decode_player_info_add() {
        let id = Uuid::from_u128(99);
        let mut buf = BytesMut::new();
        buf.put_u8(info_action::ADD_PLAYER | info_action::UPDATE_LATENCY);
        VarInt(1).proto_encode(&mut buf);
        id.proto_encode(&mut buf);
        write_string(&mut buf, "Steve");
        VarInt(0).proto_encode(&mut buf);
        VarInt(42).proto_encode(&mut buf);
        let pkt = PlayerInfoUpdate::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(pkt.entries.len(), 1);
        assert_eq!(pkt.entries[0].profile_id, id);
        assert_eq!(pkt.entries[0].name.as_deref(), Some("Steve"));
        assert_eq!(pkt.entries[0].latency, Some(42));
        assert_eq!(pkt.entries[0].game_mode, None);
    }

    #[test]
    fn encode_move_player() {
        let mut buf = BytesMut::new();
        MovePlayer {
            position: Some([1.0, 2.0, 3.0]),
            rotation: None,
            on_ground: true,
            horizontal_collision: false,
        }
        .proto_encode(&mut buf);
        assert_eq!(buf.len(), 25);
        assert_eq!(buf[24], move_flags::ON_GROUND);
    }
}

//! Play phase packets.

pub mod entity;
pub mod player;
pub mod world;

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{ensure_remaining, read_list, write_string, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::common::{ClientInformation, CustomPayload, KeepAlive, PingId, UpdateTags};
use crate::packets::{unknown, ProtocolState, RawPacket};
use crate::text::TextComponent;
use crate::types::VarInt;

use self::entity::*;
use self::player::*;
use self::world::*;

pub mod id {
    // clientbound
    pub const ADD_ENTITY: u32 = 0x01;
    pub const BLOCK_CHANGED_ACK: u32 = 0x05;
    pub const BLOCK_UPDATE: u32 = 0x09;
    pub const CHANGE_DIFFICULTY: u32 = 0x0B;
    pub const CHUNK_BATCH_FINISHED: u32 = 0x0C;
    pub const CHUNK_BATCH_START: u32 = 0x0D;
    pub const CHUNKS_BIOMES: u32 = 0x0E;
    pub const CUSTOM_PAYLOAD: u32 = 0x19;
    pub const DISCONNECT: u32 = 0x1D;
    pub const ENTITY_EVENT: u32 = 0x1F;
    pub const TELEPORT_ENTITY: u32 = 0x20;
    pub const FORGET_LEVEL_CHUNK: u32 = 0x22;
    pub const GAME_EVENT: u32 = 0x23;
    pub const KEEP_ALIVE: u32 = 0x27;
    pub const LEVEL_CHUNK_WITH_LIGHT: u32 = 0x28;
    pub const LOGIN: u32 = 0x2C;
    pub const MOVE_ENTITY_POS: u32 = 0x2F;
    pub const MOVE_ENTITY_POS_ROT: u32 = 0x30;
    pub const MOVE_ENTITY_ROT: u32 = 0x32;
    pub const PING: u32 = 0x37;
    pub const PONG_RESPONSE: u32 = 0x38;
    pub const PLAYER_COMBAT_KILL: u32 = 0x3E;
    pub const PLAYER_INFO_REMOVE: u32 = 0x3F;
    pub const PLAYER_INFO_UPDATE: u32 = 0x40;
    pub const PLAYER_POSITION: u32 = 0x42;
    pub const REMOVE_ENTITIES: u32 = 0x47;
    pub const REMOVE_MOB_EFFECT: u32 = 0x48;
    pub const RESPAWN: u32 = 0x4C;
    pub const ROTATE_HEAD: u32 = 0x4D;
    pub const SECTION_BLOCKS_UPDATE: u32 = 0x4E;
    pub const SET_CHUNK_CACHE_CENTER: u32 = 0x58;
    pub const SET_CHUNK_CACHE_RADIUS: u32 = 0x59;
    pub const SET_DEFAULT_SPAWN_POSITION: u32 = 0x5B;
    pub const SET_ENTITY_DATA: u32 = 0x5D;
    pub const SET_ENTITY_MOTION: u32 = 0x5F;
    pub const SET_EXPERIENCE: u32 = 0x61;
    pub const SET_HEALTH: u32 = 0x62;
    pub const SET_SIMULATION_DISTANCE: u32 = 0x69;
    pub const SET_TIME: u32 = 0x6B;
    pub const START_CONFIGURATION: u32 = 0x70;
    pub const SYSTEM_CHAT: u32 = 0x73;
    pub const UPDATE_ATTRIBUTES: u32 = 0x78;
    pub const UPDATE_MOB_EFFECT: u32 = 0x79;
    pub const UPDATE_TAGS: u32 = 0x7B;

    // serverbound
    pub const ACCEPT_TELEPORTATION: u32 = 0x00;
    pub const CHAT_COMMAND: u32 = 0x05;
    pub const CHAT: u32 = 0x07;
    pub const CHUNK_BATCH_RECEIVED: u32 = 0x09;
    pub const CLIENT_COMMAND: u32 = 0x0A;
    pub const CLIENT_INFORMATION: u32 = 0x0C;
    pub const CONFIGURATION_ACKNOWLEDGED: u32 = 0x0E;
    pub const SB_CUSTOM_PAYLOAD: u32 = 0x14;
    pub const INTERACT: u32 = 0x18;
    pub const SB_KEEP_ALIVE: u32 = 0x1A;
    pub const MOVE_PLAYER_POS: u32 = 0x1C;
    pub const MOVE_PLAYER_POS_ROT: u32 = 0x1D;
    pub const MOVE_PLAYER_ROT: u32 = 0x1E;
    pub const MOVE_PLAYER_STATUS_ONLY: u32 = 0x1F;
    pub const PLAYER_COMMAND: u32 = 0x28;
    pub const PLAYER_LOADED: u32 = 0x2A;
    pub const PONG: u32 = 0x2B;
    pub const SWING: u32 = 0x3A;
}

fn read_varint(buf: &mut Bytes) -> Result<i32, ProtoError> {
    Ok(VarInt::proto_decode(buf)?.0)
}

#[derive(Debug, Clone)]
pub enum ClientboundPlayPacket {
    AddEntity(AddEntity),
    BlockChangedAck { sequence: i32 },
    BlockUpdate(BlockUpdate),
    ChangeDifficulty { difficulty: u8, locked: bool },
    ChunkBatchFinished { batch_size: i32 },
    ChunkBatchStart,
    ChunksBiomes { chunks: Vec<ChunkBiomeData> },
    CustomPayload(CustomPayload),
    Disconnect { reason: TextComponent },
    EntityEvent(EntityEvent),
    TeleportEntity(TeleportEntity),
    ForgetLevelChunk(ForgetLevelChunk),
    GameEvent(GameEvent),
    KeepAlive(KeepAlive),
    LevelChunkWithLight(LevelChunkWithLight),
    Login(Box<Login>),
    MoveEntity(MoveEntity),
    Ping(PingId),
    PongResponse { time: i64 },
    PlayerCombatKill(PlayerCombatKill),
    PlayerInfoRemove(PlayerInfoRemove),
    PlayerInfoUpdate(PlayerInfoUpdate),
    PlayerPosition(PlayerPosition),
    RemoveEntities(RemoveEntities),
    RemoveMobEffect(RemoveMobEffect),
    Respawn(Box<Respawn>),
    RotateHead(RotateHead),
    SectionBlocksUpdate(SectionBlocksUpdate),
    SetChunkCacheCenter { x: i32, z: i32 },
    SetChunkCacheRadius { radius: i32 },
    SetDefaultSpawnPosition(SetDefaultSpawnPosition),
    SetEntityData(SetEntityData),
    SetEntityMotion(SetEntityMotion),
    SetExperience(SetExperience),
    SetHealth(SetHealth),
    SetSimulationDistance { distance: i32 },
    SetTime(SetTime),
    StartConfiguration,
    SystemChat(SystemChat),
    UpdateAttributes(UpdateAttributes),
    UpdateMobEffect(UpdateMobEffect),
    UpdateTags(UpdateTags),
}

impl ClientboundPlayPacket {
    pub fn decode(raw: RawPacket) -> Result<Self, ProtoError> {
        let mut buf = raw.body;
        let b = &mut buf;
        Ok(match raw.id {
            id::ADD_ENTITY => Self::AddEntity(AddEntity::proto_decode(b)?),
            id::BLOCK_CHANGED_ACK => Self::BlockChangedAck {
                sequence: read_varint(b)?,
            },
            id::BLOCK_UPDATE => Self::BlockUpdate(BlockUpdate::proto_decode(b)?),
            id::CHANGE_DIFFICULTY => {
                ensure_remaining(b, 1)?;
                let difficulty = b.get_u8();
                Self::ChangeDifficulty {
                    difficulty,
                    locked: bool::proto_decode(b)?,
                }
            }
            id::CHUNK_BATCH_FINISHED => Self::ChunkBatchFinished {
                batch_size: read_varint(b)?,
            },
            id::CHUNK_BATCH_START => Self::ChunkBatchStart,
            id::CHUNKS_BIOMES => Self::ChunksBiomes {
                chunks: read_list(b)?,
            },
            id::CUSTOM_PAYLOAD => Self::CustomPayload(CustomPayload::proto_decode(b)?),
            id::DISCONNECT => Self::Disconnect {
                reason: TextComponent::proto_decode(b)?,
            },
            id::ENTITY_EVENT => Self::EntityEvent(EntityEvent::proto_decode(b)?),
            id::TELEPORT_ENTITY => Self::TeleportEntity(TeleportEntity::proto_decode(b)?),
            id::FORGET_LEVEL_CHUNK => Self::ForgetLevelChunk(ForgetLevelChunk::proto_decode(b)?),
            id::GAME_EVENT => Self::GameEvent(GameEvent::proto_decode(b)?),
            id::KEEP_ALIVE => Self::KeepAlive(KeepAlive::proto_decode(b)?),
            id::LEVEL_CHUNK_WITH_LIGHT => {
                Self::LevelChunkWithLight(LevelChunkWithLight::proto_decode(b)?)
            }
            id::LOGIN => Self::Login(Box::new(Login::proto_decode(b)?)),
            id::MOVE_ENTITY_POS => Self::MoveEntity(MoveEntity::decode_pos(b)?),
            id::MOVE_ENTITY_POS_ROT => Self::MoveEntity(MoveEntity::decode_pos_rot(b)?),
            id::MOVE_ENTITY_ROT => Self::MoveEntity(MoveEntity::decode_rot(b)?),
            id::PING => Self::Ping(PingId::proto_decode(b)?),
            id::PONG_RESPONSE => {
                ensure_remaining(b, 8)?;
                Self::PongResponse {
                    time: b.get_i64(),
                }
            }
            id::PLAYER_COMBAT_KILL => Self::PlayerCombatKill(PlayerCombatKill::proto_decode(b)?),
            id::PLAYER_INFO_REMOVE => Self::PlayerInfoRemove(PlayerInfoRemove::proto_decode(b)?),
            id::PLAYER_INFO_UPDATE => Self::PlayerInfoUpdate(PlayerInfoUpdate::proto_decode(b)?),
            id::PLAYER_POSITION => Self::PlayerPosition(PlayerPosition::proto_decode(b)?),
            id::REMOVE_ENTITIES => Self::RemoveEntities(RemoveEntities::proto_decode(b)?),
            id::REMOVE_MOB_EFFECT => Self::RemoveMobEffect(RemoveMobEffect::proto_decode(b)?),
            id::RESPAWN => Self::Respawn(Box::new(Respawn::proto_decode(b)?)),
            id::ROTATE_HEAD => Self::RotateHead(RotateHead::proto_decode(b)?),
            id::SECTION_BLOCKS_UPDATE => {
                Self::SectionBlocksUpdate(SectionBlocksUpdate::proto_decode(b)?)
            }
            id::SET_CHUNK_CACHE_CENTER => Self::SetChunkCacheCenter {
                x: read_varint(b)?,
                z: read_varint(b)?,
            },
            id::SET_CHUNK_CACHE_RADIUS => Self::SetChunkCacheRadius {
                radius: read_varint(b)?,
            },
            id::SET_DEFAULT_SPAWN_POSITION => {
                Self::SetDefaultSpawnPosition(SetDefaultSpawnPosition::proto_decode(b)?)
            }
            id::SET_ENTITY_DATA => Self::SetEntityData(SetEntityData::proto_decode(b)?),
            id::SET_ENTITY_MOTION => Self::SetEntityMotion(SetEntityMotion::proto_decode(b)?),
            id::SET_EXPERIENCE => Self::SetExperience(SetExperience::proto_decode(b)?),
            id::SET_HEALTH => Self::SetHealth(SetHealth::proto_decode(b)?),
            id::SET_SIMULATION_DISTANCE => Self::SetSimulationDistance {
                distance: read_varint(b)?,
            },
            id::SET_TIME => Self::SetTime(SetTime::proto_decode(b)?),
            id::START_CONFIGURATION => Self::StartConfiguration,
            id::SYSTEM_CHAT => Self::SystemChat(SystemChat::proto_decode(b)?),
            id::UPDATE_ATTRIBUTES => Self::UpdateAttributes(UpdateAttributes::proto_decode(b)?),
            id::UPDATE_MOB_EFFECT => Self::UpdateMobEffect(UpdateMobEffect::proto_decode(b)?),
            id::UPDATE_TAGS => Self::UpdateTags(UpdateTags::proto_decode(b)?),
            other => return Err(unknown(ProtocolState::Play, other)),
        })
    }
}

/// `ClientCommand` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommandAction {
    PerformRespawn,
    RequestStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommandAction {
    PressShiftKey,
    ReleaseShiftKey,
    StopSleeping,
    StartSprinting,
    StopSprinting,
}

impl PlayerCommandAction {
    fn wire_id(self) -> i32 {
        match self {
            Self::PressShiftKey => 0,
            Self::ReleaseShiftKey => 1,
            Self::StopSleeping => 2,
            Self::StartSprinting => 3,
            Self::StopSprinting => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Main,
    Off,
}

#[derive(Debug, Clone)]
pub enum ServerboundPlayPacket {
    AcceptTeleportation { teleport_id: i32 },
    /// Unsigned chat message. Only accepted by servers without secure chat.
    Chat { message: String, timestamp: i64, salt: i64 },
    ChatCommand { command: String },
    ChunkBatchReceived { desired_chunks_per_tick: f32 },
    ClientCommand(ClientCommandAction),
    ClientInformation(ClientInformation),
    ConfigurationAcknowledged,
    CustomPayload(CustomPayload),
    /// Interact with the attack action.
    Attack { entity_id: i32, sneaking: bool },
    KeepAlive(KeepAlive),
    MovePlayer(MovePlayer),
    PlayerCommand { entity_id: i32, action: PlayerCommandAction },
    PlayerLoaded,
    Pong(PingId),
    Swing(Hand),
}

impl ServerboundPlayPacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::AcceptTeleportation { .. } => id::ACCEPT_TELEPORTATION,
            Self::Chat { .. } => id::CHAT,
            Self::ChatCommand { .. } => id::CHAT_COMMAND,
            Self::ChunkBatchReceived { .. } => id::CHUNK_BATCH_RECEIVED,
            Self::ClientCommand(_) => id::CLIENT_COMMAND,
            Self::ClientInformation(_) => id::CLIENT_INFORMATION,
            Self::ConfigurationAcknowledged => id::CONFIGURATION_ACKNOWLEDGED,
            Self::CustomPayload(_) => id::SB_CUSTOM_PAYLOAD,
            Self::Attack { .. } => id::INTERACT,
            Self::KeepAlive(_) => id::SB_KEEP_ALIVE,
            Self::MovePlayer(m) => match (m.position.is_some(), m.rotation.is_some()) {
                (true, true) => id::MOVE_PLAYER_POS_ROT,
                (true, false) => id::MOVE_PLAYER_POS,
                (false, true) => id::MOVE_PLAYER_ROT,
                (false, false) => id::MOVE_PLAYER_STATUS_ONLY,
            },
            Self::PlayerCommand { .. } => id::PLAYER_COMMAND,
            Self::PlayerLoaded => id::PLAYER_LOADED,
            Self::Pong(_) => id::PONG,
            Self::Swing(_) => id::SWING,
        }
    }
}

impl ProtoEncode for ServerboundPlayPacket {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::AcceptTeleportation { teleport_id } => VarInt(*teleport_id).proto_encode(buf),
            Self::Chat {
                message,
                timestamp,
                salt,
            } => {
                write_string(buf, message);
                buf.put_i64(*timestamp);
                buf.put_i64(*salt);
                // no signature, no acknowledged messages
                buf.put_u8(0);
                VarInt(0).proto_encode(buf);
                buf.put_slice(&[0; 3]);
            }
            Self::ChatCommand { command } => write_string(buf, command),
            Self::ChunkBatchReceived {
                desired_chunks_per_tick,
            } => buf.put_f32(*desired_chunks_per_tick),
            Self::ClientCommand(action) => VarInt(match action {
                ClientCommandAction::PerformRespawn => 0,
                ClientCommandAction::RequestStats => 1,
            })
            .proto_encode(buf),
            Self::ClientInformation(p) => p.proto_encode(buf),
            Self::ConfigurationAcknowledged | Self::PlayerLoaded => {}
            Self::CustomPayload(p) => p.proto_encode(buf),
            Self::KeepAlive(p) => p.proto_encode(buf),
            Self::Attack {
                entity_id,
                sneaking,
            } => {
                VarInt(*entity_id).proto_encode(buf);
                VarInt(1).proto_encode(buf);
                sneaking.proto_encode(buf);
            }
            Self::MovePlayer(p) => p.proto_encode(buf),
            Self::PlayerCommand { entity_id, action } => {
                VarInt(*entity_id).proto_encode(buf);
                VarInt(action.wire_id()).proto_encode(buf);
                VarInt(0).proto_encode(buf);
            }
            Self::Pong(p) => p.proto_encode(buf),
            Self::Swing(hand) => VarInt(match hand {
                Hand::Main => 0,
                Hand::Off => 1,
            })
            .proto_encode(buf),
        }
    }
}

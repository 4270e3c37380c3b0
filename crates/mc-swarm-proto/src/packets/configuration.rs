//! Configuration phase packets.

use bytes::{Buf, BufMut};
use mc_swarm_nbt::NbtTag;

use crate::codec::{read_list, read_nbt, write_list, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::common::{
    read_bounded_list, ClientInformation, CookieRequest, CookieResponse, CustomPayload,
    KeepAlive, KnownPack, PingId, UpdateTags,
};
use crate::packets::{unknown, ProtocolState, RawPacket};
use crate::text::TextComponent;
use crate::types::Identifier;

pub mod id {
    // clientbound
    pub const COOKIE_REQUEST: u32 = 0x00;
    pub const CUSTOM_PAYLOAD: u32 = 0x01;
    pub const DISCONNECT: u32 = 0x02;
    pub const FINISH_CONFIGURATION: u32 = 0x03;
    pub const KEEP_ALIVE: u32 = 0x04;
    pub const PING: u32 = 0x05;
    pub const RESET_CHAT: u32 = 0x06;
    pub const REGISTRY_DATA: u32 = 0x07;
    pub const UPDATE_ENABLED_FEATURES: u32 = 0x0C;
    pub const UPDATE_TAGS: u32 = 0x0D;
    pub const SELECT_KNOWN_PACKS: u32 = 0x0E;
    // serverbound
    pub const CLIENT_INFORMATION: u32 = 0x00;
    pub const SB_COOKIE_RESPONSE: u32 = 0x01;
    pub const SB_CUSTOM_PAYLOAD: u32 = 0x02;
    pub const SB_FINISH_CONFIGURATION: u32 = 0x03;
    pub const SB_KEEP_ALIVE: u32 = 0x04;
    pub const PONG: u32 = 0x05;
    pub const SB_SELECT_KNOWN_PACKS: u32 = 0x07;
}

/// The protocol caps known-pack lists at 64 entries.
const MAX_KNOWN_PACKS: usize = 64;

/// One registry entry. `data` is absent when the entry comes from a pack
/// both sides already know.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub id: Identifier,
    pub data: Option<NbtTag>,
}

impl ProtoDecode for RegistryEntry {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let id = Identifier::proto_decode(buf)?;
        let data = if bool::proto_decode(buf)? {
            read_nbt(buf)?
        } else {
            None
        };
        Ok(Self { id, data })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryData {
    pub registry: Identifier,
    pub entries: Vec<RegistryEntry>,
}

#[derive(Debug, Clone)]
pub enum ClientboundConfigurationPacket {
    CookieRequest(CookieRequest),
    CustomPayload(CustomPayload),
    Disconnect { reason: TextComponent },
    FinishConfiguration,
    KeepAlive(KeepAlive),
    Ping(PingId),
    ResetChat,
    RegistryData(RegistryData),
    UpdateEnabledFeatures { features: Vec<Identifier> },
    UpdateTags(UpdateTags),
    SelectKnownPacks { packs: Vec<KnownPack> },
}

impl ClientboundConfigurationPacket {
    pub fn decode(raw: RawPacket) -> Result<Self, ProtoError> {
        let mut buf = raw.body;
        Ok(match raw.id {
            id::COOKIE_REQUEST => Self::CookieRequest(CookieRequest::proto_decode(&mut buf)?),
            id::CUSTOM_PAYLOAD => Self::CustomPayload(CustomPayload::proto_decode(&mut buf)?),
            id::DISCONNECT => Self::Disconnect {
                reason: TextComponent::proto_decode(&mut buf)?,
            },
            id::FINISH_CONFIGURATION => Self::FinishConfiguration,
            id::KEEP_ALIVE => Self::KeepAlive(KeepAlive::proto_decode(&mut buf)?),
            id::PING => Self::Ping(PingId::proto_decode(&mut buf)?),
            id::RESET_CHAT => Self::ResetChat,
            id::REGISTRY_DATA => Self::RegistryData(RegistryData {
                registry: Identifier::proto_decode(&mut buf)?,
                entries: read_list(&mut buf)?,
            }),
            id::UPDATE_ENABLED_FEATURES => Self::UpdateEnabledFeatures {
                features: read_list(&mut buf)?,
            },
            id::UPDATE_TAGS => Self::UpdateTags(UpdateTags::proto_decode(&mut buf)?),
            id::SELECT_KNOWN_PACKS => Self::SelectKnownPacks {
                packs: read_bounded_list(&mut buf, MAX_KNOWN_PACKS)?,
            },
            other => return Err(unknown(ProtocolState::Configuration, other)),
        })
    }
}

#[derive(Debug, Clone)]
pub enum ServerboundConfigurationPacket {
    ClientInformation(ClientInformation),
    CookieResponse(CookieResponse),
    CustomPayload(CustomPayload),
    FinishConfiguration,
    KeepAlive(KeepAlive),
    Pong(PingId),
    SelectKnownPacks { packs: Vec<KnownPack> },
}

impl ServerboundConfigurationPacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::ClientInformation(_) => id::CLIENT_INFORMATION,
            Self::CookieResponse(_) => id::SB_COOKIE_RESPONSE,
            Self::CustomPayload(_) => id::SB_CUSTOM_PAYLOAD,
            Self::FinishConfiguration => id::SB_FINISH_CONFIGURATION,
            Self::KeepAlive(_) => id::SB_KEEP_ALIVE,
            Self::Pong(_) => id::PONG,
            Self::SelectKnownPacks { .. } => id::SB_SELECT_KNOWN_PACKS,
        }
    }
}

impl ProtoEncode for ServerboundConfigurationPacket {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::ClientInformation(p) => p.proto_encode(buf),
            Self::CookieResponse(p) => p.proto_encode(buf),
            Self::CustomPayload(p) => p.proto_encode(buf),
            Self::FinishConfiguration => {}
            Self::KeepAlive(p) => p.proto_encode(buf),
            Self::Pong(p) => p.proto_encode(buf),
            Self::SelectKnownPacks { packs } => write_list(buf, packs),
        }
    }
}

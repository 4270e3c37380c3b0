//! Status phase: server list ping.

use base64::Engine;
use bytes::{Buf, BufMut};
use serde::Deserialize;

use crate::codec::{ensure_remaining, read_string, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::{unknown, ProtocolState, RawPacket};
use crate::text::TextComponent;

pub mod id {
    // clientbound
    pub const STATUS_RESPONSE: u32 = 0x00;
    pub const PONG_RESPONSE: u32 = 0x01;
    // serverbound
    pub const STATUS_REQUEST: u32 = 0x00;
    pub const PING_REQUEST: u32 = 0x01;
}

/// Parsed status JSON.
#[derive(Debug, Clone, Default)]
pub struct ServerStatus {
    pub version_name: String,
    pub protocol: i32,
    pub online_players: i32,
    pub max_players: i32,
    pub description: TextComponent,
    /// Decoded PNG bytes of the server icon.
    pub favicon: Option<Vec<u8>>,
    pub enforces_secure_chat: bool,
}

#[derive(Deserialize)]
struct StatusJson {
    #[serde(default)]
    version: Option<VersionJson>,
    #[serde(default)]
    players: Option<PlayersJson>,
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    favicon: Option<String>,
    #[serde(default, rename = "enforcesSecureChat")]
    enforces_secure_chat: bool,
}

#[derive(Deserialize)]
struct VersionJson {
    name: String,
    protocol: i32,
}

#[derive(Deserialize)]
struct PlayersJson {
    max: i32,
    online: i32,
}

impl ServerStatus {
    pub fn parse(raw: &str) -> Result<Self, ProtoError> {
        let json: StatusJson =
            serde_json::from_str(raw).map_err(|e| ProtoError::JsonParse(e.to_string()))?;
        let favicon = json
            .favicon
            .as_deref()
            .and_then(|f| f.strip_prefix("data:image/png;base64,"))
            .and_then(|b64| {
                base64::engine::general_purpose::STANDARD
                    .decode(b64.replace('\n', ""))
                    .ok()
            });
        Ok(Self {
            version_name: json.version.as_ref().map(|v| v.name.clone()).unwrap_or_default(),
            protocol: json.version.as_ref().map(|v| v.protocol).unwrap_or(-1),
            online_players: json.players.as_ref().map(|p| p.online).unwrap_or(0),
            max_players: json.players.as_ref().map(|p| p.max).unwrap_or(0),
            description: json
                .description
                .as_ref()
                .map(TextComponent::from_json)
                .unwrap_or_default(),
            favicon,
            enforces_secure_chat: json.enforces_secure_chat,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ClientboundStatusPacket {
    StatusResponse { json: String },
    PongResponse { time: i64 },
}

impl ClientboundStatusPacket {
    pub fn decode(raw: RawPacket) -> Result<Self, ProtoError> {
        let mut buf = raw.body;
        match raw.id {
            id::STATUS_RESPONSE => Ok(Self::StatusResponse {
                json: read_string(&mut buf, 32767)?,
            }),
            id::PONG_RESPONSE => {
                ensure_remaining(&buf, 8)?;
                Ok(Self::PongResponse { time: buf.get_i64() })
            }
            other => Err(unknown(ProtocolState::Status, other)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ServerboundStatusPacket {
    StatusRequest,
    PingRequest { time: i64 },
}

impl ServerboundStatusPacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::StatusRequest => id::STATUS_REQUEST,
            Self::PingRequest { .. } => id::PING_REQUEST,
        }
    }
}

impl ProtoEncode for ServerboundStatusPacket {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::StatusRequest => {}
            Self::PingRequest { time } => buf.put_i64(*time),
        }
    }
}

//! Login phase packets.

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::codec::{
    read_byte_array, read_list, read_optional, read_remaining, read_string, write_byte_array,
    write_string, ProtoDecode, ProtoEncode,
};
use crate::error::ProtoError;
use crate::packets::common::{CookieRequest, CookieResponse};
use crate::packets::{unknown, ProtocolState, RawPacket};
use crate::text::{read_json_component, TextComponent};
use crate::types::{Identifier, VarInt};

pub mod id {
    // clientbound
    pub const LOGIN_DISCONNECT: u32 = 0x00;
    pub const HELLO: u32 = 0x01;
    pub const LOGIN_FINISHED: u32 = 0x02;
    pub const LOGIN_COMPRESSION: u32 = 0x03;
    pub const CUSTOM_QUERY: u32 = 0x04;
    pub const COOKIE_REQUEST: u32 = 0x05;
    // serverbound
    pub const SB_HELLO: u32 = 0x00;
    pub const KEY: u32 = 0x01;
    pub const CUSTOM_QUERY_ANSWER: u32 = 0x02;
    pub const LOGIN_ACKNOWLEDGED: u32 = 0x03;
    pub const COOKIE_RESPONSE: u32 = 0x04;
}

/// Longest RSA public key / token the client accepts.
const MAX_KEY_BYTES: usize = 4096;

/// Profile property, e.g. `textures`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

impl ProtoDecode for ProfileProperty {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            name: read_string(buf, 64)?,
            value: read_string(buf, 32767)?,
            signature: read_optional::<String>(buf)?,
        })
    }
}

/// Profile the server settled on for this connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    pub properties: Vec<ProfileProperty>,
}

impl ProtoDecode for GameProfile {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            id: Uuid::proto_decode(buf)?,
            name: read_string(buf, 16)?,
            properties: read_list(buf)?,
        })
    }
}

/// Encryption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub server_id: String,
    /// DER-encoded SubjectPublicKeyInfo.
    pub public_key: Bytes,
    pub verify_token: Bytes,
    pub should_authenticate: bool,
}

impl ProtoDecode for Hello {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            server_id: read_string(buf, 20)?,
            public_key: read_byte_array(buf, MAX_KEY_BYTES)?,
            verify_token: read_byte_array(buf, MAX_KEY_BYTES)?,
            should_authenticate: bool::proto_decode(buf)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ClientboundLoginPacket {
    LoginDisconnect { reason: TextComponent },
    Hello(Hello),
    LoginFinished(GameProfile),
    LoginCompression { threshold: i32 },
    CustomQuery { transaction_id: i32, channel: Identifier, data: Bytes },
    CookieRequest(CookieRequest),
}

impl ClientboundLoginPacket {
    pub fn decode(raw: RawPacket) -> Result<Self, ProtoError> {
        let mut buf = raw.body;
        Ok(match raw.id {
            id::LOGIN_DISCONNECT => Self::LoginDisconnect {
                reason: read_json_component(&mut buf)?,
            },
            id::HELLO => Self::Hello(Hello::proto_decode(&mut buf)?),
            id::LOGIN_FINISHED => Self::LoginFinished(GameProfile::proto_decode(&mut buf)?),
            id::LOGIN_COMPRESSION => Self::LoginCompression {
                threshold: VarInt::proto_decode(&mut buf)?.0,
            },
            id::CUSTOM_QUERY => Self::CustomQuery {
                transaction_id: VarInt::proto_decode(&mut buf)?.0,
                channel: Identifier::proto_decode(&mut buf)?,
                data: read_remaining(&mut buf),
            },
            id::COOKIE_REQUEST => Self::CookieRequest(CookieRequest::proto_decode(&mut buf)?),
            other => return Err(unknown(ProtocolState::Login, other)),
        })
    }
}

#[derive(Debug, Clone)]
pub enum ServerboundLoginPacket {
    Hello { name: String, profile_id: Uuid },
    Key { encrypted_secret: Vec<u8>, encrypted_verify_token: Vec<u8> },
    /// Answer to a custom query; bots never understand one, so no payload.
    CustomQueryAnswer { transaction_id: i32 },
    LoginAcknowledged,
    CookieResponse(CookieResponse),
}

impl ServerboundLoginPacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::Hello { .. } => id::SB_HELLO,
            Self::Key { .. } => id::KEY,
            Self::CustomQueryAnswer { .. } => id::CUSTOM_QUERY_ANSWER,
            Self::LoginAcknowledged => id::LOGIN_ACKNOWLEDGED,
            Self::CookieResponse(_) => id::COOKIE_RESPONSE,
        }
    }
}

impl ProtoEncode for ServerboundLoginPacket {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::Hello { name, profile_id } => {
                write_string(buf, name);
                profile_id.proto_encode(buf);
            }
            Self::Key {
                encrypted_secret,
                encrypted_verify_token,
            } => {
                write_byte_array(buf, encrypted_secret);
                write_byte_array(buf, encrypted_verify_token);
            }
            Self::CustomQueryAnswer { transaction_id } => {
                VarInt(*transaction_id).proto_encode(buf);
                buf.put_u8(0);
            }
            Self::LoginAcknowledged => {}
            Self::CookieResponse(p) => p.proto_encode(buf),
        }
    }
}

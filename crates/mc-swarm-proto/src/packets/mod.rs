//! Java Edition packets, grouped by protocol phase.
//!
//! Clientbound packets are closed enums decoded from a [`RawPacket`] by the
//! phase's `decode`; serverbound packets are closed enums with an `id()` and
//! a [`ProtoEncode`] body. [`Serverbound`] wraps them so the transport can
//! frame any outgoing packet.

pub mod common;
pub mod configuration;
pub mod handshake;
pub mod login;
pub mod play;
pub mod status;

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::VarInt;

pub use configuration::{ClientboundConfigurationPacket, ServerboundConfigurationPacket};
pub use handshake::ServerboundHandshakePacket;
pub use login::{ClientboundLoginPacket, ServerboundLoginPacket};
pub use play::{ClientboundPlayPacket, ServerboundPlayPacket};
pub use status::{ClientboundStatusPacket, ServerboundStatusPacket};

/// Protocol version number for 1.21.4.
pub const PROTOCOL_VERSION: i32 = 769;
pub const GAME_VERSION: &str = "1.21.4";

/// Connection phase. Inbound and outbound directions switch independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    Handshake,
    Status,
    Login,
    Configuration,
    Play,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolState::Handshake => "handshake",
            ProtocolState::Status => "status",
            ProtocolState::Login => "login",
            ProtocolState::Configuration => "configuration",
            ProtocolState::Play => "play",
        })
    }
}

/// A decoded frame split into packet id and body, not yet bound to a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: u32,
    pub body: Bytes,
}

impl RawPacket {
    pub fn from_frame(mut frame: Bytes) -> Result<Self, ProtoError> {
        let id = VarInt::proto_decode(&mut frame)?.0;
        if id < 0 {
            return Err(ProtoError::InvalidData(format!("negative packet id {id}")));
        }
        Ok(Self {
            id: id as u32,
            body: frame,
        })
    }
}

/// Any packet the client can send.
#[derive(Debug, Clone)]
pub enum Serverbound {
    Handshake(ServerboundHandshakePacket),
    Status(ServerboundStatusPacket),
    Login(ServerboundLoginPacket),
    Configuration(ServerboundConfigurationPacket),
    Play(ServerboundPlayPacket),
}

impl Serverbound {
    /// Phase the packet belongs to.
    pub fn state(&self) -> ProtocolState {
        match self {
            Serverbound::Handshake(_) => ProtocolState::Handshake,
            Serverbound::Status(_) => ProtocolState::Status,
            Serverbound::Login(_) => ProtocolState::Login,
            Serverbound::Configuration(_) => ProtocolState::Configuration,
            Serverbound::Play(_) => ProtocolState::Play,
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Serverbound::Handshake(p) => p.id(),
            Serverbound::Status(p) => p.id(),
            Serverbound::Login(p) => p.id(),
            Serverbound::Configuration(p) => p.id(),
            Serverbound::Play(p) => p.id(),
        }
    }

    /// Encode as `VarInt(id) + body`, ready for framing.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        VarInt(self.id() as i32).proto_encode(&mut buf);
        match self {
            Serverbound::Handshake(p) => p.proto_encode(&mut buf),
            Serverbound::Status(p) => p.proto_encode(&mut buf),
            Serverbound::Login(p) => p.proto_encode(&mut buf),
            Serverbound::Configuration(p) => p.proto_encode(&mut buf),
            Serverbound::Play(p) => p.proto_encode(&mut buf),
        }
        buf.freeze()
    }
}

impl From<ServerboundHandshakePacket> for Serverbound {
    fn from(p: ServerboundHandshakePacket) -> Self {
        Serverbound::Handshake(p)
    }
}

impl From<ServerboundStatusPacket> for Serverbound {
    fn from(p: ServerboundStatusPacket) -> Self {
        Serverbound::Status(p)
    }
}

impl From<ServerboundLoginPacket> for Serverbound {
    fn from(p: ServerboundLoginPacket) -> Self {
        Serverbound::Login(p)
    }
}

impl From<ServerboundConfigurationPacket> for Serverbound {
    fn from(p: ServerboundConfigurationPacket) -> Self {
        Serverbound::Configuration(p)
    }
}

impl From<ServerboundPlayPacket> for Serverbound {
    fn from(p: ServerboundPlayPacket) -> Self {
        Serverbound::Play(p)
    }
}

fn unknown(state: ProtocolState, id: u32) -> ProtoError {
    ProtoError::UnknownPacketId { state, id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_packet_split() {
        let raw = RawPacket::from_frame(Bytes::from_static(&[0x2C, 1, 2, 3])).unwrap();
        assert_eq!(raw.id, 0x2C);
        assert_eq!(&raw.body[..], &[1, 2, 3]);
    }

    #[test]
    fn raw_packet_empty_frame() {
        assert!(RawPacket::from_frame(Bytes::new()).is_err());
    }

    #[test]
    fn serverbound_encode_prefixes_id() {
        let pkt: Serverbound = ServerboundStatusPacket::PingRequest { time: 7 }.into();
        assert_eq!(pkt.state(), ProtocolState::Status);
        let bytes = pkt.encode();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn state_display() {
        assert_eq!(ProtocolState::Configuration.to_string(), "configuration");
    }
}

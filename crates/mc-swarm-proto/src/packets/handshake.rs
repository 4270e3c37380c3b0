//! Handshake phase: the single `ClientIntention` packet.

use bytes::BufMut;

use crate::codec::{write_string, ProtoEncode};
use crate::types::VarInt;

pub mod id {
    pub const CLIENT_INTENTION: u32 = 0x00;
}

/// What the client wants to do after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIntent {
    Status,
    Login,
    Transfer,
}

impl ClientIntent {
    pub fn to_id(self) -> i32 {
        match self {
            ClientIntent::Status => 1,
            ClientIntent::Login => 2,
            ClientIntent::Transfer => 3,
        }
    }
}

/// First packet on every connection.
#[derive(Debug, Clone)]
pub struct ClientIntention {
    pub protocol_version: i32,
    /// Host name as typed by the user, not the resolved address.
    pub host: String,
    pub port: u16,
    pub intent: ClientIntent,
}

impl ProtoEncode for ClientIntention {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.protocol_version).proto_encode(buf);
        write_string(buf, &self.host);
        buf.put_u16(self.port);
        VarInt(self.intent.to_id()).proto_encode(buf);
    }
}

#[derive(Debug, Clone)]
pub enum ServerboundHandshakePacket {
    ClientIntention(ClientIntention),
}

impl ServerboundHandshakePacket {
    pub fn id(&self) -> u32 {
        match self {
            Self::ClientIntention(_) => id::CLIENT_INTENTION,
        }
    }
}

impl ProtoEncode for ServerboundHandshakePacket {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::ClientIntention(p) => p.proto_encode(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encode_intention() {
        let pkt = ClientIntention {
            protocol_version: 769,
            host: "localhost".into(),
            port: 25565,
            intent: ClientIntent::Login,
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        // VarInt(769) = [0x81, 0x06]
        assert_eq!(&buf[..2], &[0x81, 0x06]);
        assert_eq!(buf[2], 9);
        assert_eq!(&buf[3..12], b"localhost");
        assert_eq!(&buf[12..14], &[0x63, 0xDD]);
        assert_eq!(buf[14], 2);
        assert_eq!(buf.len(), 15);
    }
}

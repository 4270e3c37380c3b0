//! Stream codecs: cipher, framing and compression for each direction.

use bytes::{Bytes, BytesMut};

use mc_swarm_crypto::{PacketDecryptor, PacketEncryptor};
use mc_swarm_proto::codec::ProtoDecode;
use mc_swarm_proto::frame::FrameCodec;
use mc_swarm_proto::packets::{login, RawPacket};
use mc_swarm_proto::types::VarInt;

use crate::error::BotError;

/// Inbound side. Bytes are decrypted as they arrive, then split into frames.
///
/// Until the login finishes the reader applies `LoginCompression` itself:
/// the server switches right after sending it, before the connection worker
/// has seen the packet.
pub struct PacketReader {
    frames: FrameCodec,
    decryptor: Option<PacketDecryptor>,
    buffer: BytesMut,
    in_login: bool,
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketReader {
    pub fn new() -> Self {
        Self {
            frames: FrameCodec::new(),
            decryptor: None,
            buffer: BytesMut::with_capacity(8192),
            in_login: true,
        }
    }

    pub fn enable_encryption(&mut self, secret: &[u8]) -> Result<(), BotError> {
        self.decryptor = Some(PacketDecryptor::new(secret)?);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.decryptor.is_some()
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.frames.threshold()
    }

    /// Append freshly read bytes.
    pub fn feed(&mut self, data: &mut [u8]) {
        if let Some(decryptor) = &mut self.decryptor {
            decryptor.decrypt(data);
        }
        self.buffer.extend_from_slice(data);
    }

    /// Next complete packet, or `None` when more bytes are needed.
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>, BotError> {
        let Some(frame) = self.frames.decode(&mut self.buffer)? else {
            return Ok(None);
        };
        let packet = RawPacket::from_frame(frame)?;
        if self.in_login {
            match packet.id {
                login::id::LOGIN_COMPRESSION => {
                    let threshold = VarInt::proto_decode(&mut packet.body.clone())?.0;
                    self.frames.set_compression(threshold);
                }
                login::id::LOGIN_FINISHED => self.in_login = false,
                _ => {}
            }
        }
        Ok(Some(packet))
    }
}

/// Outbound side: frame, compress, then encrypt.
#[derive(Default)]
pub struct PacketWriter {
    frames: FrameCodec,
    encryptor: Option<PacketEncryptor>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_encryption(&mut self, secret: &[u8]) -> Result<(), BotError> {
        self.encryptor = Some(PacketEncryptor::new(secret)?);
        Ok(())
    }

    pub fn set_compression(&mut self, threshold: i32) {
        self.frames.set_compression(threshold);
    }

    /// Encode one `id + body` packet into wire bytes.
    pub fn encode(&mut self, packet: &[u8]) -> Result<Bytes, BotError> {
        let mut out = BytesMut::with_capacity(packet.len() + 8);
        self.frames.encode(packet, &mut out)?;
        if let Some(encryptor) = &mut self.encryptor {
            encryptor.encrypt(&mut out);
        }
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_swarm_proto::codec::ProtoEncode;

    fn packet(id: i32, body: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        VarInt(id).proto_encode(&mut buf);
        buf.extend_from_slice(body);
        buf.to_vec()
    }

    #[test]
    fn login_compression_applies_to_following_frames() {
        let mut server = PacketWriter::new();
        let mut wire = BytesMut::new();
        let mut threshold = BytesMut::new();
        VarInt(64).proto_encode(&mut threshold);
        wire.extend_from_slice(&server.encode(&packet(0x03, &threshold)).unwrap());
        server.set_compression(64);
        let big = vec![7u8; 500];
        wire.extend_from_slice(&server.encode(&packet(0x02, &big)).unwrap());

        let mut reader = PacketReader::new();
        reader.feed(&mut wire.to_vec());
        let first = reader.next_packet().unwrap().unwrap();
        assert_eq!(first.id, 0x03);
        assert_eq!(reader.compression_threshold(), Some(64));
        let second = reader.next_packet().unwrap().unwrap();
        assert_eq!(second.id, 0x02);
        assert_eq!(&second.body[..], &big[..]);
        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn id_three_after_login_is_not_compression() {
        let mut server = PacketWriter::new();
        let mut wire = Vec::new();
        wire.extend_from_slice(&server.encode(&packet(0x02, &[])).unwrap());
        // configuration FinishConfiguration shares the id
        wire.extend_from_slice(&server.encode(&packet(0x03, &[])).unwrap());

        let mut reader = PacketReader::new();
        reader.feed(&mut wire);
        reader.next_packet().unwrap().unwrap();
        let finish = reader.next_packet().unwrap().unwrap();
        assert_eq!(finish.id, 0x03);
        assert_eq!(reader.compression_threshold(), None);
    }

    #[test]
    fn encrypted_stream_split_across_reads() {
        let secret = [3u8; 16];
        let mut writer = PacketWriter::new();
        writer.enable_encryption(&secret).unwrap();
        let mut wire = Vec::new();
        for i in 0..3 {
            wire.extend_from_slice(&writer.encode(&packet(0x20 + i, &[i as u8; 40])).unwrap());
        }

        let mut reader = PacketReader::new();
        reader.enable_encryption(&secret).unwrap();
        let mut ids = Vec::new();
        for chunk in wire.chunks_mut(7) {
            reader.feed(chunk);
            while let Some(p) = reader.next_packet().unwrap() {
                ids.push(p.id);
            }
        }
        assert_eq!(ids, vec![0x20, 0x21, 0x22]);
    }
}

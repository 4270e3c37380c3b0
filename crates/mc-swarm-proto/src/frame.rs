//! Length-prefixed framing with optional threshold compression.
//!
//! ```text
//! uncompressed: VarInt(len) | id + body
//! compressed:   VarInt(len) | VarInt(data_len) | zlib(id + body)   (data_len >= threshold)
//!                           | VarInt(0)        | id + body         (below threshold)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::ProtoEncode;
use crate::compression;
use crate::error::ProtoError;
use crate::types::{VarInt, VarIntError};

/// Largest frame body a 3-byte VarInt length can describe.
pub const MAX_FRAME_SIZE: usize = 2_097_151;

/// Stateful framer for one direction of a connection.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    threshold: Option<usize>,
    level: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            threshold: None,
            level: 6,
        }
    }

    /// Apply a server-sent threshold. Negative values disable compression.
    pub fn set_compression(&mut self, threshold: i32) {
        self.threshold = usize::try_from(threshold).ok();
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level.min(9);
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Frame one packet (`id + body`) onto `out`.
    pub fn encode(&self, packet: &[u8], out: &mut BytesMut) -> Result<(), ProtoError> {
        let body: BytesMut = match self.threshold {
            None => BytesMut::from(packet),
            Some(threshold) => {
                let mut body = BytesMut::with_capacity(packet.len() + 5);
                if packet.len() >= threshold {
                    VarInt(packet.len() as i32).proto_encode(&mut body);
                    body.put_slice(&compression::compress(packet, self.level)?);
                } else {
                    VarInt(0).proto_encode(&mut body);
                    body.put_slice(packet);
                }
                body
            }
        };
        if body.len() > MAX_FRAME_SIZE {
            return Err(ProtoError::FrameTooLarge {
                len: body.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        out.reserve(body.len() + 3);
        VarInt(body.len() as i32).proto_encode(out);
        out.put_slice(&body);
        Ok(())
    }

    /// Split one complete frame off `src` and return its `id + body`.
    /// `Ok(None)` means more bytes are needed.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Bytes>, ProtoError> {
        let (len, header) = match VarInt::decode(&src[..]) {
            Ok((len, header)) => (len.0, header),
            Err(VarIntError::BufferTooShort) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len < 0 {
            return Err(ProtoError::NegativeLength(len));
        }
        let len = len as usize;
        if len > MAX_FRAME_SIZE {
            return Err(ProtoError::FrameTooLarge {
                len,
                max: MAX_FRAME_SIZE,
            });
        }
        if src.len() < header + len {
            return Ok(None);
        }
        src.advance(header);
        let mut frame = src.split_to(len).freeze();

        let Some(threshold) = self.threshold else {
            return Ok(Some(frame));
        };

        let data_len = {
            let (data_len, used) = VarInt::decode(&frame)?;
            frame.advance(used);
            data_len.0
        };
        if data_len < 0 {
            return Err(ProtoError::NegativeLength(data_len));
        }
        if data_len == 0 {
            return Ok(Some(frame));
        }
        let data_len = data_len as usize;
        if data_len < threshold {
            return Err(ProtoError::BelowThreshold {
                len: data_len,
                threshold,
            });
        }
        Ok(Some(Bytes::from(compression::decompress(&frame, data_len)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_frame_layout() {
        let codec = FrameCodec::new();
        let mut out = BytesMut::new();
        codec.encode(&[0x00, 0xAB], &mut out).unwrap();
        assert_eq!(&out[..], &[0x02, 0x00, 0xAB]);
        assert_eq!(&codec.decode(&mut out).unwrap().unwrap()[..], &[0x00, 0xAB]);
        assert!(out.is_empty());
    }

    #[test]
    fn partial_frames_wait() {
        let codec = FrameCodec::new();
        let mut whole = BytesMut::new();
        codec.encode(&[1, 2, 3, 4, 5], &mut whole).unwrap();

        let mut src = BytesMut::from(&whole[..3]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&whole[3..]);
        assert_eq!(&codec.decode(&mut src).unwrap().unwrap()[..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn several_frames_in_one_read() {
        let codec = FrameCodec::new();
        let mut src = BytesMut::new();
        codec.encode(&[1], &mut src).unwrap();
        codec.encode(&[2, 2], &mut src).unwrap();
        assert_eq!(&codec.decode(&mut src).unwrap().unwrap()[..], &[1]);
        assert_eq!(&codec.decode(&mut src).unwrap().unwrap()[..], &[2, 2]);
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn below_threshold_sent_raw() {
        let mut codec = FrameCodec::new();
        codec.set_compression(256);
        let mut out = BytesMut::new();
        codec.encode(&[0x1A, 0x01], &mut out).unwrap();
        assert_eq!(&out[..], &[0x03, 0x00, 0x1A, 0x01]);
        assert_eq!(&codec.decode(&mut out).unwrap().unwrap()[..], &[0x1A, 0x01]);
    }

    #[test]
    fn above_threshold_compressed() {
        let mut codec = FrameCodec::new();
        codec.set_compression(64);
        let packet = vec![0x42u8; 1000];
        let mut out = BytesMut::new();
        codec.encode(&packet, &mut out).unwrap();
        assert!(out.len() < packet.len());
        assert_eq!(&codec.decode(&mut out).unwrap().unwrap()[..], &packet[..]);
    }

    #[test]
    fn compressed_below_threshold_rejected() {
        let mut sender = FrameCodec::new();
        sender.set_compression(0);
        let mut out = BytesMut::new();
        sender.encode(&[9u8; 10], &mut out).unwrap();

        let mut receiver = FrameCodec::new();
        receiver.set_compression(256);
        assert!(matches!(
            receiver.decode(&mut out),
            Err(ProtoError::BelowThreshold { len: 10, threshold: 256 })
        ));
    }

    #[test]
    fn negative_threshold_disables() {
        let mut codec = FrameCodec::new();
        codec.set_compression(128);
        assert_eq!(codec.threshold(), Some(128));
        codec.set_compression(-1);
        assert_eq!(codec.threshold(), None);
    }

    #[test]
    fn oversized_length_rejected() {
        let codec = FrameCodec::new();
        let mut src = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(ProtoError::FrameTooLarge { .. })
        ));
    }
}

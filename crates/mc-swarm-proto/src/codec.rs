//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut, Bytes};
use mc_swarm_nbt::NbtTag;

use crate::error::ProtoError;
use crate::types::VarInt;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Fail with `BufferTooShort` unless `needed` bytes remain.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Write a protocol string (VarInt byte length + UTF-8).
pub fn write_string(buf: &mut impl BufMut, s: &str) {
    VarInt(s.len() as i32).proto_encode(buf);
    buf.put_slice(s.as_bytes());
}

/// Read a protocol string of at most `max_chars` UTF-16 units.
pub fn read_string(buf: &mut impl Buf, max_chars: usize) -> Result<String, ProtoError> {
    let len = read_len(buf)?;
    if len > max_chars * 3 {
        return Err(ProtoError::StringTooLong {
            len,
            max: max_chars * 3,
        });
    }
    ensure_remaining(buf, len)?;
    let data = buf.copy_to_bytes(len);
    let s = String::from_utf8(data.to_vec()).map_err(|_| ProtoError::InvalidUtf8)?;
    let chars = s.encode_utf16().count();
    if chars > max_chars {
        return Err(ProtoError::StringTooLong {
            len: chars,
            max: max_chars,
        });
    }
    Ok(s)
}

/// Write a VarInt-prefixed byte array.
pub fn write_byte_array(buf: &mut impl BufMut, data: &[u8]) {
    VarInt(data.len() as i32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a VarInt-prefixed byte array of at most `max` bytes.
pub fn read_byte_array(buf: &mut impl Buf, max: usize) -> Result<Bytes, ProtoError> {
    let len = read_len(buf)?;
    if len > max {
        return Err(ProtoError::FrameTooLarge { len, max });
    }
    ensure_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

/// Read a VarInt length prefix, rejecting negative values.
pub fn read_len(buf: &mut impl Buf) -> Result<usize, ProtoError> {
    let len = VarInt::proto_decode(buf)?.0;
    if len < 0 {
        return Err(ProtoError::NegativeLength(len));
    }
    Ok(len as usize)
}

/// Read a VarInt-prefixed list.
pub fn read_list<T: ProtoDecode>(buf: &mut impl Buf) -> Result<Vec<T>, ProtoError> {
    let len = read_len(buf)?;
    // Every element takes at least one byte; cap the preallocation by what is left.
    let mut out = Vec::with_capacity(len.min(buf.remaining()));
    for _ in 0..len {
        out.push(T::proto_decode(buf)?);
    }
    Ok(out)
}

/// Write a VarInt-prefixed list.
pub fn write_list<T: ProtoEncode>(buf: &mut impl BufMut, items: &[T]) {
    VarInt(items.len() as i32).proto_encode(buf);
    for item in items {
        item.proto_encode(buf);
    }
}

/// Read a boolean-prefixed optional value.
pub fn read_optional<T: ProtoDecode>(buf: &mut impl Buf) -> Result<Option<T>, ProtoError> {
    if bool::proto_decode(buf)? {
        Ok(Some(T::proto_decode(buf)?))
    } else {
        Ok(None)
    }
}

/// Write a boolean-prefixed optional value.
pub fn write_optional<T: ProtoEncode>(buf: &mut impl BufMut, value: Option<&T>) {
    match value {
        Some(v) => {
            buf.put_u8(1);
            v.proto_encode(buf);
        }
        None => buf.put_u8(0),
    }
}

/// Read a nameless network NBT value.
pub fn read_nbt(buf: &mut impl Buf) -> Result<Option<NbtTag>, ProtoError> {
    Ok(mc_swarm_nbt::read_nbt_network(buf)?)
}

/// Consume and return everything left in the buffer.
pub fn read_remaining(buf: &mut impl Buf) -> Bytes {
    buf.copy_to_bytes(buf.remaining())
}

impl ProtoEncode for bool {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(*self as u8);
    }
}

impl ProtoDecode for bool {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 1)?;
        match buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtoError::InvalidData(format!("boolean byte {other}"))),
        }
    }
}

impl ProtoEncode for uuid::Uuid {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u128(self.as_u128());
    }
}

impl ProtoDecode for uuid::Uuid {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 16)?;
        Ok(uuid::Uuid::from_u128(buf.get_u128()))
    }
}

impl ProtoEncode for String {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        write_string(buf, self);
    }
}

impl ProtoDecode for String {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        read_string(buf, 32767)
    }
}

impl ProtoDecode for i32 {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(VarInt::proto_decode(buf)?.0)
    }
}

impl ProtoEncode for i32 {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(*self).proto_encode(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn string_roundtrip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello, Java!");
        let result = read_string(&mut buf.freeze(), 16).unwrap();
        assert_eq!(result, "Hello, Java!");
    }

    #[test]
    fn string_unicode_counts_chars() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "日本語");
        // 9 UTF-8 bytes, 3 chars: fits a 3 char limit.
        assert_eq!(read_string(&mut buf.freeze(), 3).unwrap(), "日本語");
    }

    #[test]
    fn string_over_limit() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "seventeen_chars__");
        assert!(matches!(
            read_string(&mut buf.freeze(), 16),
            Err(ProtoError::StringTooLong { .. })
        ));
    }

    #[test]
    fn string_buffer_too_short() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Hello");
        let truncated = buf.freeze().slice(..3);
        assert!(read_string(&mut truncated.clone(), 16).is_err());
    }

    #[test]
    fn negative_length_rejected() {
        let mut data = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert!(matches!(read_len(&mut data), Err(ProtoError::NegativeLength(-1))));
    }

    #[test]
    fn byte_array_limit() {
        let mut buf = BytesMut::new();
        write_byte_array(&mut buf, &[1, 2, 3, 4]);
        let frozen = buf.freeze();
        assert_eq!(&read_byte_array(&mut frozen.clone(), 4).unwrap()[..], &[1, 2, 3, 4]);
        assert!(read_byte_array(&mut frozen.clone(), 3).is_err());
    }

    #[test]
    fn uuid_big_endian() {
        let id = uuid::Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let mut buf = BytesMut::new();
        id.proto_encode(&mut buf);
        assert_eq!(buf[0], 0x00);
        assert_eq!(buf[15], 0xFF);
        assert_eq!(uuid::Uuid::proto_decode(&mut buf.freeze()).unwrap(), id);
    }

    #[test]
    fn optional_and_list() {
        let mut buf = BytesMut::new();
        write_optional(&mut buf, Some(&"x".to_string()));
        write_optional::<String>(&mut buf, None);
        write_list(&mut buf, &[1i32, 300, -1]);
        let mut data = buf.freeze();
        assert_eq!(read_optional::<String>(&mut data).unwrap(), Some("x".to_string()));
        assert_eq!(read_optional::<String>(&mut data).unwrap(), None);
        assert_eq!(read_list::<i32>(&mut data).unwrap(), vec![1, 300, -1]);
        assert!(!data.has_remaining());
    }

    #[test]
    fn invalid_bool_rejected() {
        let mut data = Bytes::from_static(&[2]);
        assert!(bool::proto_decode(&mut data).is_err());
    }
}

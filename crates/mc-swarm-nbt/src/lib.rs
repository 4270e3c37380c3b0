//! NBT (Named Binary Tag) for Minecraft Java Edition.
//!
//! All numbers are big-endian and strings are length-prefixed modified UTF-8.
//! Two root layouts exist:
//! - **Named**: `TAG_Compound` + root name + payload. Used by files.
//! - **Nameless**: type byte + payload, any tag type, `TAG_End` meaning
//!   "absent". Used by every packet since 1.20.2.

pub mod error;
mod io;
pub mod mutf8;
pub mod tag;

pub use error::NbtError;
pub use tag::{NbtCompound, NbtRoot, NbtTag};

use bytes::{Buf, BufMut};

/// Read a named root compound.
pub fn read_nbt_named(buf: &mut impl Buf) -> Result<NbtRoot, NbtError> {
    io::read_named_root(buf)
}

/// Write a named root compound.
pub fn write_nbt_named(buf: &mut impl BufMut, root: &NbtRoot) -> Result<(), NbtError> {
    io::write_named_root(buf, root)
}

/// Read a nameless network root. `Ok(None)` when the sender wrote `TAG_End`.
pub fn read_nbt_network(buf: &mut impl Buf) -> Result<Option<NbtTag>, NbtError> {
    io::read_nameless_root(buf)
}

/// Write a nameless network root, `None` as `TAG_End`.
pub fn write_nbt_network(buf: &mut impl BufMut, tag: Option<&NbtTag>) -> Result<(), NbtError> {
    io::write_nameless_root(buf, tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip_named(root: &NbtRoot) {
        let mut buf = BytesMut::new();
        write_nbt_named(&mut buf, root).unwrap();
        let decoded = read_nbt_named(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, *root);
    }

    fn roundtrip_network(tag: NbtTag) {
        let mut buf = BytesMut::new();
        write_nbt_network(&mut buf, Some(&tag)).unwrap();
        let decoded = read_nbt_network(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, Some(tag));
    }

    fn dimension_type() -> NbtCompound {
        let mut c = NbtCompound::new();
        c.insert("min_y".into(), NbtTag::Int(-64));
        c.insert("height".into(), NbtTag::Int(384));
        c.insert("has_skylight".into(), NbtTag::Byte(1));
        c.insert("coordinate_scale".into(), NbtTag::Double(1.0));
        c.insert("ambient_light".into(), NbtTag::Float(0.0));
        c.insert("effects".into(), NbtTag::String("minecraft:overworld".into()));
        c
    }

    #[test]
    fn named_root_roundtrip() {
        roundtrip_named(&NbtRoot::new("", dimension_type()));
        roundtrip_named(&NbtRoot::new("Level", NbtCompound::new()));
    }

    #[test]
    fn network_compound_roundtrip() {
        roundtrip_network(NbtTag::Compound(dimension_type()));
    }

    #[test]
    fn network_string_root() {
        // Plain text components are sent as a bare string root.
        roundtrip_network(NbtTag::String("Kicked".into()));
    }

    #[test]
    fn network_arrays_and_lists() {
        let mut c = NbtCompound::new();
        c.insert("MOTION_BLOCKING".into(), NbtTag::LongArray(vec![i64::MIN, 0, i64::MAX]));
        c.insert("ints".into(), NbtTag::IntArray(vec![1, -2, 300]));
        c.insert("bytes".into(), NbtTag::ByteArray(vec![1, -2, 3]));
        c.insert(
            "extra".into(),
            NbtTag::List(vec![NbtTag::String("a".into()), NbtTag::String("b".into())]),
        );
        c.insert("empty".into(), NbtTag::List(vec![]));
        roundtrip_network(NbtTag::Compound(c));
    }

    #[test]
    fn network_end_is_none() {
        let data = bytes::Bytes::from_static(&[0]);
        assert_eq!(read_nbt_network(&mut data.clone()).unwrap(), None);

        let mut buf = BytesMut::new();
        write_nbt_network(&mut buf, None).unwrap();
        assert_eq!(&buf[..], &[0]);
    }

    #[test]
    fn big_endian_int_layout() {
        let mut buf = BytesMut::new();
        write_nbt_network(&mut buf, Some(&NbtTag::Int(1))).unwrap();
        assert_eq!(&buf[..], &[3, 0, 0, 0, 1]);
    }

    #[test]
    fn named_layout_has_name() {
        let mut buf = BytesMut::new();
        write_nbt_named(&mut buf, &NbtRoot::new("ab", NbtCompound::new())).unwrap();
        assert_eq!(&buf[..], &[10, 0, 2, b'a', b'b', 0]);
    }

    #[test]
    fn empty_buffer_error() {
        let data = bytes::Bytes::new();
        assert!(read_nbt_named(&mut data.clone()).is_err());
        assert!(read_nbt_network(&mut data.clone()).is_err());
    }

    #[test]
    fn wrong_root_type_error() {
        let data = bytes::Bytes::from_static(&[1]);
        assert!(matches!(
            read_nbt_named(&mut data.clone()),
            Err(NbtError::ExpectedCompound { got: 1 })
        ));
    }

    #[test]
    fn truncated_payload_error() {
        let data = bytes::Bytes::from_static(&[3, 0, 0]);
        assert!(matches!(
            read_nbt_network(&mut data.clone()),
            Err(NbtError::UnexpectedEof)
        ));
    }

    #[test]
    fn negative_length_rejected() {
        let data = bytes::Bytes::from_static(&[7, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            read_nbt_network(&mut data.clone()),
            Err(NbtError::NegativeLength(-1))
        ));
    }
}

//! Packet bodies shared by the configuration and play phases.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{
    ensure_remaining, read_len, read_list, read_remaining, read_string,
    write_byte_array, write_string, ProtoDecode, ProtoEncode,
};
use crate::error::ProtoError;
use crate::types::{Identifier, VarInt};

// ---------------------------------------------------------------------------
// Keep-alive / ping
// ---------------------------------------------------------------------------

/// Keep-alive in either direction. Clients echo the id unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub id: i64,
}

impl ProtoEncode for KeepAlive {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.id);
    }
}

impl ProtoDecode for KeepAlive {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 8)?;
        Ok(Self { id: buf.get_i64() })
    }
}

/// Ping (clientbound) / pong (serverbound) with an `i32` id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingId {
    pub id: i32,
}

impl ProtoEncode for PingId {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.id);
    }
}

impl ProtoDecode for PingId {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 4)?;
        Ok(Self { id: buf.get_i32() })
    }
}

// ---------------------------------------------------------------------------
// Plugin channels / cookies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPayload {
    pub channel: Identifier,
    pub data: Bytes,
}

impl CustomPayload {
    /// The `minecraft:brand` payload announcing the client brand.
    pub fn brand(brand: &str) -> Self {
        let mut data = bytes::BytesMut::new();
        write_string(&mut data, brand);
        Self {
            channel: Identifier::vanilla("brand"),
            data: data.freeze(),
        }
    }
}

impl ProtoEncode for CustomPayload {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.channel.proto_encode(buf);
        buf.put_slice(&self.data);
    }
}

impl ProtoDecode for CustomPayload {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            channel: Identifier::proto_decode(buf)?,
            data: read_remaining(buf),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRequest {
    pub key: Identifier,
}

impl ProtoDecode for CookieRequest {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            key: Identifier::proto_decode(buf)?,
        })
    }
}

/// Answer to a cookie request. Bots store no cookies, so `payload` is
/// normally `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieResponse {
    pub key: Identifier,
    pub payload: Option<Bytes>,
}

impl ProtoEncode for CookieResponse {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.key.proto_encode(buf);
        match &self.payload {
            Some(data) => {
                buf.put_u8(1);
                write_byte_array(buf, data);
            }
            None => buf.put_u8(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Client information
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInformation {
    pub locale: String,
    pub view_distance: i8,
    /// 0 full, 1 system only, 2 hidden.
    pub chat_visibility: i32,
    pub chat_colors: bool,
    /// Displayed skin parts bitmask.
    pub model_customisation: u8,
    /// 0 left, 1 right.
    pub main_hand: i32,
    pub text_filtering: bool,
    pub allows_listing: bool,
    /// 0 all, 1 decreased, 2 minimal.
    pub particle_status: i32,
}

impl Default for ClientInformation {
    fn default() -> Self {
        Self {
            locale: "en_us".into(),
            view_distance: 8,
            chat_visibility: 0,
            chat_colors: true,
            model_customisation: 0x7F,
            main_hand: 1,
            text_filtering: false,
            allows_listing: true,
            particle_status: 0,
        }
    }
}

impl ProtoEncode for ClientInformation {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        write_string(buf, &self.locale);
        buf.put_i8(self.view_distance);
        VarInt(self.chat_visibility).proto_encode(buf);
        self.chat_colors.proto_encode(buf);
        buf.put_u8(self.model_customisation);
        VarInt(self.main_hand).proto_encode(buf);
        self.text_filtering.proto_encode(buf);
        self.allows_listing.proto_encode(buf);
        VarInt(self.particle_status).proto_encode(buf);
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// One named tag and the registry ids it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: Identifier,
    pub entries: Vec<i32>,
}

impl ProtoDecode for TagEntry {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            name: Identifier::proto_decode(buf)?,
            entries: read_list::<i32>(buf)?,
        })
    }
}

/// All tags of one registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTags {
    pub registry: Identifier,
    pub tags: Vec<TagEntry>,
}

impl ProtoDecode for RegistryTags {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            registry: Identifier::proto_decode(buf)?,
            tags: read_list(buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTags {
    pub registries: Vec<RegistryTags>,
}

impl ProtoDecode for UpdateTags {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            registries: read_list(buf)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Known packs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPack {
    pub namespace: String,
    pub id: String,
    pub version: String,
}

impl KnownPack {
    /// The vanilla core pack for the supported game version.
    pub fn core() -> Self {
        Self {
            namespace: "minecraft".into(),
            id: "core".into(),
            version: crate::packets::GAME_VERSION.into(),
        }
    }
}

impl ProtoEncode for KnownPack {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        write_string(buf, &self.namespace);
        write_string(buf, &self.id);
        write_string(buf, &self.version);
    }
}

impl ProtoDecode for KnownPack {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            namespace: read_string(buf, 32767)?,
            id: read_string(buf, 32767)?,
            version: read_string(buf, 32767)?,
        })
    }
}

/// Read a list capped at `max` elements.
pub(crate) fn read_bounded_list<T: ProtoDecode>(
    buf: &mut impl Buf,
    max: usize,
) -> Result<Vec<T>, ProtoError> {
    let len = read_len(buf)?;
    if len > max {
        return Err(ProtoError::InvalidData(format!(
            "list of {len} entries exceeds limit of {max}"
        )));
    }
    let mut out = Vec::with_capacity(len.min(buf.remaining()));
    for _ in 0..len {
        out.push(T::proto_decode(buf)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_list;
    use bytes::BytesMut;

    #[test]
    fn keep_alive_echo_bytes() {
        let mut data = Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        let ka = KeepAlive::proto_decode(&mut data).unwrap();
        let mut out = BytesMut::new();
        ka.proto_encode(&mut out);
        assert_eq!(&out[..], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn brand_payload() {
        let brand = CustomPayload::brand("vanilla");
        assert_eq!(brand.channel.to_string(), "minecraft:brand");
        assert_eq!(&brand.data[..], b"\x07vanilla");
    }

    #[test]
    fn decode_update_tags() {
        let mut buf = BytesMut::new();
        VarInt(1).proto_encode(&mut buf);
        write_string(&mut buf, "minecraft:block");
        VarInt(1).proto_encode(&mut buf);
        write_string(&mut buf, "minecraft:climbable");
        write_list(&mut buf, &[10i32, 11, 12]);
        let tags = UpdateTags::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(tags.registries.len(), 1);
        assert_eq!(tags.registries[0].registry.path, "block");
        assert_eq!(tags.registries[0].tags[0].name.path, "climbable");
        assert_eq!(tags.registries[0].tags[0].entries, vec![10, 11, 12]);
    }

    #[test]
    fn bounded_list_rejects_oversize() {
        let mut buf = BytesMut::new();
        write_list(&mut buf, &[KnownPack::core(), KnownPack::core()]);
        assert!(read_bounded_list::<KnownPack>(&mut buf.clone().freeze(), 1).is_err());
        assert_eq!(read_bounded_list::<KnownPack>(&mut buf.freeze(), 64).unwrap().len(), 2);
    }

    #[test]
    fn cookie_response_without_payload() {
        let mut buf = BytesMut::new();
        CookieResponse {
            key: Identifier::vanilla("session"),
            payload: None,
        }
        .proto_encode(&mut buf);
        assert_eq!(buf[0] as usize, "minecraft:session".len());
        assert_eq!(*buf.last().unwrap(), 0);
    }
}

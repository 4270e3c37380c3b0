//! Java "modified UTF-8" as used by NBT strings.
//!
//! Differs from UTF-8 in two places: NUL is written as `C0 80`, and code
//! points above the BMP are written as two 3-byte encoded surrogates.

use crate::error::NbtError;

/// Encode a Rust string into modified UTF-8.
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Decode modified UTF-8 bytes into a Rust string.
pub fn decode(bytes: &[u8]) -> Result<String, NbtError> {
    // Fast path: plain ASCII without NUL is identical in both encodings.
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return String::from_utf8(bytes.to_vec()).map_err(|_| NbtError::InvalidMutf8);
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let unit = if b0 & 0x80 == 0 {
            i += 1;
            b0 as u16
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            i += 2;
            ((b0 as u16 & 0x1F) << 6) | b1
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            i += 3;
            ((b0 as u16 & 0x0F) << 12) | (b1 << 6) | b2
        } else {
            return Err(NbtError::InvalidMutf8);
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| NbtError::InvalidMutf8)
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16, NbtError> {
    match bytes.get(index) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(NbtError::InvalidMutf8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_unchanged() {
        assert_eq!(encode("minecraft:overworld"), b"minecraft:overworld");
        assert_eq!(decode(b"hello").unwrap(), "hello");
    }

    #[test]
    fn nul_uses_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn supplementary_chars_use_surrogates() {
        let encoded = encode("\u{1F600}");
        assert_eq!(encoded.len(), 6);
        assert_eq!(encoded[0], 0xED);
        assert_eq!(decode(&encoded).unwrap(), "\u{1F600}");
    }

    #[test]
    fn bmp_multibyte() {
        let s = "Grüße 日本";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn truncated_sequence_rejected() {
        assert!(decode(&[0xE0, 0x80]).is_err());
        assert!(decode(&[0xFF]).is_err());
    }
}

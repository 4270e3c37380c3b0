//! Server-id digest used by the join-confirmation call.
//!
//! `SHA-1(server_id || secret || public_key)` read as a signed big-endian
//! integer and printed in lowercase hex without leading zeros.

use sha1::{Digest, Sha1};

pub fn server_hash(server_id: &str, secret: &[u8], public_key: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(secret);
    hasher.update(public_key);
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    signed_hex(digest)
}

fn signed_hex(mut digest: [u8; 20]) -> String {
    let negative = digest[0] & 0x80 != 0;
    if negative {
        // two's complement: invert then add one
        let mut carry = true;
        for byte in digest.iter_mut().rev() {
            let (value, overflow) = (!*byte).overflowing_add(carry as u8);
            *byte = value;
            carry = overflow;
        }
    }
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let trimmed = hex.trim_start_matches('0');
    let body = if trimmed.is_empty() { "0" } else { trimmed };
    if negative {
        format!("-{body}")
    } else {
        body.to_string()
    }
}

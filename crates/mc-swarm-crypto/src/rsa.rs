//! RSA PKCS#1 v1.5 wrapping of the shared secret and verify token.

use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::CryptoError;

/// Parse the server's DER-encoded SubjectPublicKeyInfo.
pub fn parse_public_key(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Encrypt `data` for the server with PKCS#1 v1.5 padding.
pub fn encrypt(key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    key.encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, data)
        .map_err(|e| CryptoError::Rsa(e.to_string()))
}

/// Wrap the shared secret and echo the verify token, as sent in the login
/// `Key` packet.
pub fn encrypt_key_response(
    public_key_der: &[u8],
    secret: &[u8],
    verify_token: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let key = parse_public_key(public_key_der)?;
    Ok((encrypt(&key, secret)?, encrypt(&key, verify_token)?))
}

//! Cryptography for the Java login handshake: AES-128-CFB8 stream cipher,
//! RSA key wrapping and the server-id digest.

pub mod cipher;
pub mod rsa;
pub mod server_hash;

pub use cipher::{PacketDecryptor, PacketEncryptor};
pub use server_hash::server_hash;

use rand::RngCore;
use thiserror::Error;

/// Length of the shared secret in bytes (AES-128).
pub const SECRET_LEN: usize = 16;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("RSA error: {0}")]
    Rsa(String),

    #[error("shared secret must be {SECRET_LEN} bytes, got {0}")]
    InvalidSecretLength(usize),
}

/// Fresh random shared secret from the OS RNG.
pub fn generate_shared_secret() -> [u8; SECRET_LEN] {
    let mut secret = [0u8; SECRET_LEN];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

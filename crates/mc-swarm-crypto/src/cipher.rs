//! AES-128-CFB8 stream encryption.
//!
//! After the key exchange both directions are encrypted with the shared
//! secret as key and IV. The cipher state runs continuously over the whole
//! byte stream, not per packet, so each direction keeps its own instance.

use aes::Aes128;
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cfb8::{Decryptor, Encryptor};

use crate::{CryptoError, SECRET_LEN};

fn key_from(secret: &[u8]) -> Result<&[u8; SECRET_LEN], CryptoError> {
    secret
        .try_into()
        .map_err(|_| CryptoError::InvalidSecretLength(secret.len()))
}

/// Outbound half of the stream cipher.
pub struct PacketEncryptor {
    cipher: Encryptor<Aes128>,
}

impl PacketEncryptor {
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        let key = key_from(secret)?;
        Ok(Self {
            cipher: Encryptor::<Aes128>::new(key.into(), key.into()),
        })
    }

    /// Encrypt `data` in place, continuing the stream.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        // CFB8 has a one-byte block: feed bytes through the block API so the
        // shift register carries over between calls.
        for byte in data.iter_mut() {
            self.cipher
                .encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
        }
    }
}

/// Inbound half of the stream cipher.
pub struct PacketDecryptor {
    cipher: Decryptor<Aes128>,
}

impl PacketDecryptor {
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        let key = key_from(secret)?;
        Ok(Self {
            cipher: Decryptor::<Aes128>::new(key.into(), key.into()),
        })
    }

    /// Decrypt `data` in place, continuing the stream.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.cipher
                .decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
        }
    }
}

impl std::fmt::Debug for PacketEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PacketEncryptor")
    }
}

impl std::fmt::Debug for PacketDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PacketDecryptor")
    }
}

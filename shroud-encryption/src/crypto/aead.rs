// SPDX-License-Identifier: MIT OR Apache-2.0

//! ChaCha20Poly1305 authenticated encryption with associated data (AEAD)
//! with 256-bit key, 96-bit nonce and 128-bit tag.
use chacha20poly1305::{AeadInPlace, ChaCha20Poly1305, Key, KeyInit, Nonce};
use thiserror::Error;

/// 96-bit nonce, freshly random per encryption.
pub type AeadNonce = [u8; 12];

/// 256-bit key.
pub type AeadKey = [u8; 32];

/// Size of the authentication tag appended to the ciphertext.
pub const AEAD_TAG_SIZE: usize = 16;

/// ChaCha20-Poly1305 AEAD encryption function.
///
/// The authentication tag is attached to the end of the ciphertext.
pub fn aead_encrypt(
    key: &AeadKey,
    plaintext: &[u8],
    nonce: AeadNonce,
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, AeadError> {
    let key = Key::from_slice(key);
    let nonce = Nonce::from_slice(&nonce);
    let mut ciphertext: Vec<u8> = Vec::from(plaintext);

    let cipher = ChaCha20Poly1305::new(key);
    cipher
        .encrypt_in_place(nonce, aad.unwrap_or_default(), &mut ciphertext)
        .map_err(AeadError::Encrypt)?;

    Ok(ciphertext)
}

/// ChaCha20-Poly1305 AEAD decryption function.
pub fn aead_decrypt(
    key: &AeadKey,
    ciphertext_with_tag: &[u8],
    nonce: AeadNonce,
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, AeadError> {
    let key = Key::from_slice(key);
    let nonce = Nonce::from_slice(&nonce);
    let mut plaintext: Vec<u8> = Vec::from(ciphertext_with_tag);

    let cipher = ChaCha20Poly1305::new(key);
    cipher
        .decrypt_in_place(nonce, aad.unwrap_or_default(), &mut plaintext)
        .map_err(AeadError::Decrypt)?;

    Ok(plaintext)
}

#[derive(Debug, Error)]
pub enum AeadError {
    #[error("plaintext could not be encrypted with chacha20 aead: {0}")]
    Encrypt(chacha20poly1305::Error),

    #[error("ciphertext could not be decrypted with chacha20 aead: {0}")]
    Decrypt(chacha20poly1305::Error),
}

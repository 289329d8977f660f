use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::error::CryptoError;

/// Builds the 96-bit ChaCha20-Poly1305 nonce from a 64-bit per-direction
/// counter: 4 zero bytes followed by the counter in little-endian, matching
/// the convention the NTCP2 AEAD construction fixes (no nonce negotiation).
fn nonce_from_counter(n: u64) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(&n.to_le_bytes());
    Nonce::from(bytes)
}

/// Seals `plaintext` in place, appending the 16-byte Poly1305 tag, under
/// `key` with nonce built from the counter `n` and the given associated
/// data. Returns the ciphertext+tag.
pub fn seal(key: &[u8; 32], n: u64, associated_data: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = nonce_from_counter(n);
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, associated_data, &mut buffer)
        .expect("ChaCha20-Poly1305 encryption does not fail for in-bounds plaintexts");
    buffer.extend_from_slice(tag.as_slice());
    buffer
}

/// Opens `ciphertext_and_tag` (ciphertext followed by its 16-byte tag)
/// under `key` with nonce built from the counter `n`. On authentication
/// failure returns `CryptoError::DecryptFailure` and never yields partial
/// plaintext.
pub fn open(
    key: &[u8; 32],
    n: u64,
    associated_data: &[u8],
    ciphertext_and_tag: &[u8],
    op: &'static str,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext_and_tag.len() < 16 {
        return Err(CryptoError::DecryptFailure { op });
    }
    let (ciphertext, tag) = ciphertext_and_tag.split_at(ciphertext_and_tag.len() - 16);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = nonce_from_counter(n);
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(&nonce, associated_data, &mut buffer, tag.into())
        .map_err(|_| CryptoError::DecryptFailure { op })?;
    Ok(buffer)
}

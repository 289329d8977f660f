use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::keys::{AesIv, IdentHash};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Obfuscates (and deobfuscates) the 32-byte X25519 ephemeral public key
/// carried in SessionRequest/SessionCreated. This is AES-256-CBC with no
/// padding: the plaintext is always exactly two 16-byte blocks.
///
/// Used nowhere else in the protocol — the data phase and the rest of the
/// handshake rely solely on the AEAD construction.
pub fn obfuscate(key: &IdentHash, iv: &AesIv, pubkey: &[u8; 32]) -> [u8; 32] {
    let mut buf = *pubkey;
    Aes256CbcEnc::new(key.as_bytes().into(), iv.as_bytes().into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, 32)
        .expect("plaintext is exactly two AES blocks");
    buf
}

pub fn deobfuscate(key: &IdentHash, iv: &AesIv, ciphertext: &[u8; 32]) -> [u8; 32] {
    let mut buf = *ciphertext;
    Aes256CbcDec::new(key.as_bytes().into(), iv.as_bytes().into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .expect("ciphertext is exactly two AES blocks");
    buf
}

/// The IV for SessionCreated's obfuscation is the last 16 bytes of
/// SessionRequest's AEAD ciphertext — retained here as a named helper so
/// callers never have to re-slice the SessionRequest wire buffer.
pub fn chained_iv(session_request_ciphertext: &[u8; 16]) -> AesIv {
    AesIv(*session_request_ciphertext)
}

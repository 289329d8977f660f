use zeroize::Zeroize;

use ntcp2_crypto::{aead, hash, kdf};

/// The fixed Noise protocol name mixed into `h` at initialization. Both
/// sides must agree on this literal string or the handshake fails (the
/// obfuscated-ephemeral, two-extra-hash-step variant NTCP2 defines).
pub const PROTOCOL_NAME: &str = "Noise_XKaesobfse+hs2+hs3_25519_ChaChaPoly_SHA256";

/// The symmetric half of the handshake state: the chaining key `ck`, the
/// running mix hash `h`, and an optional AEAD key/nonce pair installed by
/// the most recent `MixKey`. `ck` and the AEAD key are secret; `h` is a
/// running hash of public transcript data and carries no secrecy
/// requirement, so only the former are wiped on drop.
pub struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    cipher: Option<(([u8; 32]), u64)>,
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.ck.zeroize();
        if let Some((key, _)) = &mut self.cipher {
            key.zeroize();
        }
    }
}

impl SymmetricState {
    pub fn initialize(protocol_name: &str) -> Self {
        let h = hash::sha256(protocol_name.as_bytes());
        Self {
            ck: h,
            h,
            cipher: None,
        }
    }

    pub fn h(&self) -> &[u8; 32] {
        &self.h
    }

    pub fn ck(&self) -> &[u8; 32] {
        &self.ck
    }

    /// `h ← SHA256(h || data)`.
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = hash::sha256_two(&self.h, data);
    }

    /// `ck, temp_k ← HKDF(ck, input)`; installs `temp_k` as the AEAD key
    /// with a fresh nonce counter.
    pub fn mix_key(&mut self, input: &[u8]) {
        let (new_ck, temp_k) = kdf::hkdf2(&self.ck, input);
        self.ck = new_ck;
        self.cipher = Some((temp_k, 0));
    }

    /// Encrypts `plaintext` under the current key (if any) using `h` as
    /// associated data, then mixes the resulting ciphertext into `h`.
    /// With no key installed yet, this degrades to a bare `MixHash` of the
    /// plaintext, matching Noise's definition of `EncryptAndHash` with an
    /// empty key.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let ciphertext = match &mut self.cipher {
            Some((key, n)) => {
                let ct = aead::seal(key, *n, &self.h, plaintext);
                *n += 1;
                ct
            }
            None => plaintext.to_vec(),
        };
        self.mix_hash(&ciphertext);
        ciphertext
    }

    /// Inverse of [`Self::encrypt_and_hash`].
    pub fn decrypt_and_hash(
        &mut self,
        ciphertext: &[u8],
        op: &'static str,
    ) -> Result<Vec<u8>, ntcp2_crypto::CryptoError> {
        let plaintext = match &mut self.cipher {
            Some((key, n)) => {
                let pt = aead::open(key, *n, &self.h, ciphertext, op)?;
                *n += 1;
                pt
            }
            None => ciphertext.to_vec(),
        };
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }
}

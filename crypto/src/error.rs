use thiserror::Error;

/// Crypto-layer failures. Every variant names the operation that failed;
/// none carries raw key or ciphertext material (see NTCP2 core error policy).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("{op}: authentication failed")]
    DecryptFailure { op: &'static str },

    #[error("{op}: invalid key length")]
    InvalidKeyLength { op: &'static str },

    #[error("{op}: AEAD nonce space exhausted")]
    NonceExhausted { op: &'static str },
}

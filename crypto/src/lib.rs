//! Fixed-parameter cryptographic primitives for the NTCP2 transport.
//!
//! No algorithm negotiation: X25519 for Diffie-Hellman, AES-256-CBC only
//! for obfuscating the handshake's ephemeral public keys, ChaCha20-Poly1305
//! for all AEAD, SipHash-2-4 for data-phase length obfuscation, and
//! HMAC-SHA-256-based HKDF for key derivation.

pub mod aead;
pub mod aes_obfuscation;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod siphash;

pub use error::CryptoError;
pub use keys::{AesIv, EphemeralKeyPair, IdentHash, SecretBytes32, StaticKeyPair, X25519PublicKey};
pub use siphash::SipLengthMask;

use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A long-term X25519 identity keypair, owned by one local router.
///
/// The private half is zeroised on drop; the public half is embedded in the
/// published RouterInfo and carries no secrecy requirement.
#[derive(Clone)]
pub struct StaticKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl StaticKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    pub fn diffie_hellman(&self, their_public: &PublicKey) -> [u8; 32] {
        self.secret.diffie_hellman(their_public).to_bytes()
    }
}

/// An X25519 keypair regenerated per handshake and destroyed once the
/// session transitions to the data phase.
pub struct EphemeralKeyPair {
    secret: Option<StaticSecret>,
    public: PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self {
            secret: Some(secret),
            public,
        }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    /// Performs the DH and then destroys the ephemeral private key: an
    /// ephemeral key is used for exactly one DH operation per the Noise_XK
    /// token sequence it participates in.
    pub fn diffie_hellman(&mut self, their_public: &PublicKey) -> [u8; 32] {
        let secret = self.secret.as_ref().expect("ephemeral key already consumed");
        let shared = secret.diffie_hellman(their_public).to_bytes();
        shared
    }

    pub fn destroy(&mut self) {
        self.secret = None;
    }
}

/// SHA-256 of the remote RouterIdentity. Used as associated data and as the
/// AES-CBC key for ephemeral-key obfuscation. No secrecy requirement: it is
/// derivable from the (public) RouterInfo.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IdentHash(pub [u8; 32]);

impl IdentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// The 16-byte AES-CBC IV published in the remote RouterInfo, used for the
/// initiator's first-message ephemeral-key obfuscation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AesIv(pub [u8; 16]);

impl AesIv {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// A 32-byte symmetric key that must be wiped when no longer needed
/// (cipher keys, chaining keys, KDF outputs).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes32(pub [u8; 32]);

impl SecretBytes32 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

pub use x25519_dalek::PublicKey as X25519PublicKey;

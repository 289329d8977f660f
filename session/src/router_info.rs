use std::net::SocketAddr;

use ntcp2_crypto::{AesIv, IdentHash, X25519PublicKey};

/// Which IP family a listener/outbound attempt targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressFamily {
    V4,
    V6,
}

/// The core's only window onto RouterInfo: a caller-supplied provider for
/// the fields the handshake actually needs. RouterInfo parsing and signing
/// are out of scope here — an external collaborator owns that format; this
/// trait is the seam.
pub trait RouterInfoProvider: Send + Sync {
    /// The router's long-term X25519 static public key.
    fn static_pub(&self) -> X25519PublicKey;

    /// SHA-256 of the router identity; doubles as the AES-CBC obfuscation
    /// key for this router's handshake messages.
    fn ident_hash(&self) -> IdentHash;

    /// The AES-CBC IV published for this router's first obfuscated message.
    fn aes_iv(&self) -> AesIv;

    /// Published transport addresses for the given family, most-preferred
    /// first.
    fn addresses(&self, family: AddressFamily) -> Vec<SocketAddr>;

    /// The already-serialized RouterInfo payload to embed in the
    /// RouterInfo block sent during SessionConfirmed.
    fn serialized(&self) -> Vec<u8>;

    /// Extracts the static public key from a serialized RouterInfo blob
    /// received from a peer, for the SessionConfirmed identity check
    /// (§4.4.3). Returns `None` if the bytes don't parse — the caller
    /// treats that identically to `IdentityMismatch`.
    fn extract_static_pub(&self, serialized: &[u8]) -> Option<X25519PublicKey>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ntcp2_crypto::StaticKeyPair;

    /// A fixed, never-network-reachable provider for tests that only need
    /// *a* valid `RouterInfoProvider`, not realistic addresses.
    pub(crate) struct StaticProvider {
        static_key: StaticKeyPair,
    }

    impl StaticProvider {
        pub(crate) fn new() -> Self {
            Self { static_key: StaticKeyPair::generate(&mut rand::thread_rng()) }
        }
    }

    impl RouterInfoProvider for StaticProvider {
        fn static_pub(&self) -> X25519PublicKey {
            self.static_key.public()
        }
        fn ident_hash(&self) -> IdentHash {
            IdentHash([0u8; 32])
        }
        fn aes_iv(&self) -> AesIv {
            AesIv([0u8; 16])
        }
        fn addresses(&self, _family: AddressFamily) -> Vec<SocketAddr> {
            Vec::new()
        }
        fn serialized(&self) -> Vec<u8> {
            self.static_key.public().as_bytes().to_vec()
        }
        fn extract_static_pub(&self, serialized: &[u8]) -> Option<X25519PublicKey> {
            if serialized.len() != 32 {
                return None;
            }
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(serialized);
            Some(X25519PublicKey::from(bytes))
        }
    }
}

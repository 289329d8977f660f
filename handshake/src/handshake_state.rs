use ntcp2_crypto::{EphemeralKeyPair, StaticKeyPair, X25519PublicKey};

use crate::symmetric::{SymmetricState, PROTOCOL_NAME};

/// Which side of the handshake this state belongs to. Modeled as a tagged
/// variant rather than an inheritance hierarchy: processors hold a `Role`
/// and branch once inside `process`, instead of overriding virtual methods.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Initiator,
    Responder,
}

/// The full Noise_XK(sk) handshake state shared, one mutable borrow at a
/// time, by the three message processors. Owned exclusively by the
/// `Session` for the duration of one handshake.
pub struct HandshakeState {
    pub(crate) symmetric: SymmetricState,
    pub role: Role,
    pub local_static: StaticKeyPair,
    pub local_ephemeral: Option<EphemeralKeyPair>,
    pub remote_static: X25519PublicKey,
    pub remote_ephemeral: Option<X25519PublicKey>,
}

impl HandshakeState {
    /// `remote_static` is known in advance for both roles: the initiator
    /// reads it from the destination's RouterInfo; the responder's own
    /// static public key plays the same role in the protocol-name mixing
    /// step (Noise_XK requires the initiator to know `rs` up front).
    pub fn new(role: Role, local_static: StaticKeyPair, remote_static: X25519PublicKey) -> Self {
        let mut symmetric = SymmetricState::initialize(PROTOCOL_NAME);

        // Noise_XK mixes the responder's static public key into `h` before
        // any messages are exchanged. From the initiator's side that's the
        // `remote_static` it was given; from the responder's side that's
        // its own static public key.
        match role {
            Role::Initiator => symmetric.mix_hash(remote_static.as_bytes()),
            Role::Responder => symmetric.mix_hash(local_static.public().as_bytes()),
        }

        Self {
            symmetric,
            role,
            local_static,
            local_ephemeral: None,
            remote_static,
            remote_ephemeral: None,
        }
    }

    pub fn symmetric(&mut self) -> &mut SymmetricState {
        &mut self.symmetric
    }

    pub fn h(&self) -> [u8; 32] {
        *self.symmetric.h()
    }

    pub fn ck(&self) -> [u8; 32] {
        *self.symmetric.ck()
    }
}

use byteorder::{BigEndian, ByteOrder};

use ntcp2_crypto::kdf;

use crate::handshake_state::{HandshakeState, Role};

/// Key material produced once SessionConfirmed completes: two directional
/// AEAD keys plus the SipHash state each side seeds its length-obfuscation
/// keystream from. `sip_k1`/`sip_k2` are shared by both directions; the
/// running IV is per-direction (§4.5).
///
/// The `..._i2r`/`..._r2i` naming names the wire direction (initiator→
/// responder, responder→initiator) rather than "send"/"recv", since which
/// one is "send" depends on which role is asking.
pub struct DataPhaseKeys {
    pub k_i2r: [u8; 32],
    pub k_r2i: [u8; 32],
    pub sip_k1: u64,
    pub sip_k2: u64,
    pub sip_iv_i2r: u64,
    pub sip_iv_r2i: u64,
}

impl DataPhaseKeys {
    /// `(send_key, recv_key, sip_iv_send, sip_iv_recv)` from this role's
    /// point of view.
    pub fn for_role(&self, role: Role) -> ([u8; 32], [u8; 32], u64, u64) {
        match role {
            Role::Initiator => (self.k_i2r, self.k_r2i, self.sip_iv_i2r, self.sip_iv_r2i),
            Role::Responder => (self.k_r2i, self.k_i2r, self.sip_iv_r2i, self.sip_iv_i2r),
        }
    }
}

/// Derives the data phase key material from the chaining key left by
/// SessionConfirmed. One `HKDF(ck, empty)` call producing three 32-byte
/// outputs: the two directional AEAD keys, then a third block packed as
/// `sip_k1(8) || sip_k2(8) || sip_iv_i2r(8) || sip_iv_r2i(8)`.
pub fn split(state: &HandshakeState) -> DataPhaseKeys {
    let (k_i2r, k_r2i, sip_material) = kdf::hkdf3(&state.ck(), &[]);

    DataPhaseKeys {
        k_i2r,
        k_r2i,
        sip_k1: BigEndian::read_u64(&sip_material[0..8]),
        sip_k2: BigEndian::read_u64(&sip_material[8..16]),
        sip_iv_i2r: BigEndian::read_u64(&sip_material[16..24]),
        sip_iv_r2i: BigEndian::read_u64(&sip_material[24..32]),
    }
}

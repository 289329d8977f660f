use std::io::{Read, Write};

use ntcp2_block::{Block, BlockList};
use ntcp2_crypto::{aead, SipLengthMask};
use ntcp2_handshake::{DataPhaseKeys, Role};

use crate::error::SessionError;

const LENGTH_PREFIX_LEN: usize = 2;
const TAG_LEN: usize = 16;
const MAX_FRAME_PLAINTEXT: usize = u16::MAX as usize;

/// The post-handshake framed transport: SipHash-obfuscated length prefixes
/// wrapping ChaCha20-Poly1305 frames, one independent key/nonce/SipHash
/// state per direction (§4.5).
pub struct DataPhase {
    send_key: [u8; 32],
    recv_key: [u8; 32],
    send_nonce: u64,
    recv_nonce: u64,
    sip_send: SipLengthMask,
    sip_recv: SipLengthMask,
}

impl DataPhase {
    pub fn from_split(keys: &DataPhaseKeys, role: Role) -> Self {
        let (send_key, recv_key, sip_iv_send, sip_iv_recv) = keys.for_role(role);
        Self {
            send_key,
            recv_key,
            send_nonce: 0,
            recv_nonce: 0,
            sip_send: SipLengthMask::new(keys.sip_k1, keys.sip_k2, sip_iv_send),
            sip_recv: SipLengthMask::new(keys.sip_k1, keys.sip_k2, sip_iv_recv),
        }
    }

    /// Seals `blocks` as one AEAD frame and writes the length-obfuscated
    /// frame to `out`. A single short write — no partial frame is ever
    /// observable on the wire (§5's cancellation guarantee).
    pub fn write<W: Write>(&mut self, out: &mut W, blocks: &[Block]) -> Result<(), SessionError> {
        if self.send_nonce == u64::MAX {
            return Err(SessionError::NonceExhausted);
        }

        let mut plaintext = Vec::new();
        for block in blocks {
            block.serialize(&mut plaintext)?;
        }
        if plaintext.len() > MAX_FRAME_PLAINTEXT {
            return Err(SessionError::Block(ntcp2_block::BlockError::CarrierOverflow {
                total: plaintext.len(),
                capacity: MAX_FRAME_PLAINTEXT,
            }));
        }

        let sealed = aead::seal(&self.send_key, self.send_nonce, &[], &plaintext);
        self.send_nonce += 1;

        let l_plain = sealed.len() as u16;
        let l_wire = self.sip_send.apply(l_plain);

        out.write_all(&l_wire.to_be_bytes())
            .map_err(|source| SessionError::SocketError { op: "DataPhase::write length", source })?;
        out.write_all(&sealed)
            .map_err(|source| SessionError::SocketError { op: "DataPhase::write frame", source })?;
        Ok(())
    }

    /// Reads one frame from `input`, authenticates it, and parses the
    /// plaintext as a block sequence. An AEAD failure is fatal: the caller
    /// must terminate the session (§7).
    pub fn read<R: Read>(&mut self, input: &mut R) -> Result<Vec<Block>, SessionError> {
        if self.recv_nonce == u64::MAX {
            return Err(SessionError::NonceExhausted);
        }

        let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
        input
            .read_exact(&mut len_bytes)
            .map_err(|source| SessionError::SocketError { op: "DataPhase::read length", source })?;
        let l_wire = u16::from_be_bytes(len_bytes);
        let l_plain = self.sip_recv.apply(l_wire);

        if (l_plain as usize) < TAG_LEN {
            return Err(SessionError::Handshake(ntcp2_handshake::HandshakeError::DecryptFailure {
                op: "DataPhase::read",
                source: ntcp2_crypto::CryptoError::DecryptFailure {
                    op: "DataPhase::read: frame shorter than the AEAD tag",
                },
            }));
        }

        let mut ciphertext = vec![0u8; l_plain as usize];
        input
            .read_exact(&mut ciphertext)
            .map_err(|source| SessionError::SocketError { op: "DataPhase::read frame", source })?;

        let plaintext = aead::open(&self.recv_key, self.recv_nonce, &[], &ciphertext, "DataPhase::read")
            .map_err(|source| ntcp2_handshake::HandshakeError::DecryptFailure { op: "DataPhase::read", source })?;
        self.recv_nonce += 1;

        let blocks = BlockList::parse_from(&plaintext)?;
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> DataPhaseKeys {
        DataPhaseKeys {
            k_i2r: [1u8; 32],
            k_r2i: [2u8; 32],
            sip_k1: 0x0102030405060708,
            sip_k2: 0x1112131415161718,
            sip_iv_i2r: 42,
            sip_iv_r2i: 99,
        }
    }

    #[test]
    fn round_trips_a_frame_each_direction() {
        let keys = keys();
        let mut initiator = DataPhase::from_split(&keys, Role::Initiator);
        let mut responder = DataPhase::from_split(&keys, Role::Responder);

        let blocks = vec![Block::Padding { bytes: vec![1, 2, 3] }];
        let mut wire = Vec::new();
        initiator.write(&mut wire, &blocks).unwrap();

        let mut cursor = &wire[..];
        let parsed = responder.read(&mut cursor).unwrap();
        assert_eq!(parsed, blocks);
    }

    #[test]
    fn nonce_advances_by_one_per_frame() {
        let keys = keys();
        let mut initiator = DataPhase::from_split(&keys, Role::Initiator);
        let mut responder = DataPhase::from_split(&keys, Role::Responder);

        for _ in 0..3 {
            let mut wire = Vec::new();
            initiator
                .write(&mut wire, &[Block::Padding { bytes: vec![0] }])
                .unwrap();
            let mut cursor = &wire[..];
            responder.read(&mut cursor).unwrap();
        }

        assert_eq!(initiator.send_nonce, 3);
        assert_eq!(responder.recv_nonce, 3);
    }

    #[test]
    fn tampered_frame_fails_to_open() {
        let keys = keys();
        let mut initiator = DataPhase::from_split(&keys, Role::Initiator);
        let mut responder = DataPhase::from_split(&keys, Role::Responder);

        let mut wire = Vec::new();
        initiator
            .write(&mut wire, &[Block::Padding { bytes: vec![7; 4] }])
            .unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;

        let mut cursor = &wire[..];
        let err = responder.read(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Handshake(ntcp2_handshake::HandshakeError::DecryptFailure { .. })
        ));
    }

    #[test]
    fn nonce_just_before_wrap_is_accepted_then_wrap_terminates() {
        let keys = keys();
        let mut initiator = DataPhase::from_split(&keys, Role::Initiator);
        let mut responder = DataPhase::from_split(&keys, Role::Responder);
        initiator.send_nonce = u64::MAX - 1;
        responder.recv_nonce = u64::MAX - 1;

        let mut wire = Vec::new();
        initiator
            .write(&mut wire, &[Block::Padding { bytes: vec![0] }])
            .unwrap();
        let mut cursor = &wire[..];
        responder.read(&mut cursor).unwrap();

        assert_eq!(initiator.send_nonce, u64::MAX);
        assert_eq!(responder.recv_nonce, u64::MAX);

        let write_err = initiator
            .write(&mut Vec::new(), &[Block::Padding { bytes: vec![0] }])
            .unwrap_err();
        assert!(matches!(write_err, SessionError::NonceExhausted));

        let mut empty_cursor: &[u8] = &[];
        let read_err = responder.read(&mut empty_cursor).unwrap_err();
        assert!(matches!(read_err, SessionError::NonceExhausted));
    }
}

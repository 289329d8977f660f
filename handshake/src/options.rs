use byteorder::{BigEndian, ByteOrder};

/// The 16-byte plaintext carried (AEAD-sealed) by every handshake message:
/// `version(1) || reserved(7) || m3p2_len(2 BE) || pad_len(2 BE) || timestamp(4 BE)`.
///
/// The same layout is reused by SessionRequest and SessionCreated; only
/// `m3p2_len` is meaningful coming from the initiator (SessionCreated's
/// options echoes 0 there, since part 2's length is the initiator's own
/// business).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HandshakeOptions {
    pub version: u8,
    pub m3p2_len: u16,
    pub pad_len: u16,
    pub timestamp: u32,
}

pub const LEN: usize = 16;

/// The only router-info-format version this engine speaks.
pub const CURRENT_VERSION: u8 = 2;

impl HandshakeOptions {
    pub fn encode(&self) -> [u8; LEN] {
        let mut out = [0u8; LEN];
        out[0] = self.version;
        // out[1..8] reserved, left zeroed.
        BigEndian::write_u16(&mut out[8..10], self.m3p2_len);
        BigEndian::write_u16(&mut out[10..12], self.pad_len);
        BigEndian::write_u32(&mut out[12..16], self.timestamp);
        out
    }

    pub fn decode(bytes: &[u8; LEN]) -> Self {
        Self {
            version: bytes[0],
            m3p2_len: BigEndian::read_u16(&bytes[8..10]),
            pad_len: BigEndian::read_u16(&bytes[10..12]),
            timestamp: BigEndian::read_u32(&bytes[12..16]),
        }
    }
}

//! The NTCP2 block codec (§4.3 of the core spec).
//!
//! Blocks are variable-length, typed frames: a 1-byte type tag, a 2-byte
//! big-endian size, and `size` bytes of type-specific data. They're carried
//! inside handshake payloads (SessionConfirmed part 2) and the data phase.
//! Modeled as a sum type (`Block`) rather than an inheritance hierarchy,
//! per the core's design notes on replacing OO block hierarchies.

pub mod error;

use byteorder::{BigEndian, ByteOrder};
pub use error::BlockError;

const HEADER_LEN: usize = 3;

/// RouterInfo blocks carry an opaque, externally-parsed RouterInfo payload.
/// These bounds police only the raw byte length; RouterInfo/RouterIdentity
/// parsing itself is out of the core's scope (see §1 of the core spec).
pub const MIN_ROUTER_INFO_LEN: usize = 1;
pub const MAX_ROUTER_INFO_LEN: usize = u16::MAX as usize - 3;

const TAG_DATE_TIME: u8 = 0;
const TAG_OPTIONS: u8 = 1;
const TAG_ROUTER_INFO: u8 = 2;
const TAG_I2NP_MESSAGE: u8 = 3;
const TAG_TERMINATION: u8 = 240;
const TAG_PADDING: u8 = 254;

/// The block sum type. `serialize`/`deserialize` dispatch on the
/// discriminant with a single match each — no inheritance hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    DateTime {
        unix_time: u32,
    },
    /// A generic key/value option list. Each pair is encoded as a 1-byte
    /// key length, the key, a 1-byte value length, and the value.
    Options {
        pairs: Vec<(Vec<u8>, Vec<u8>)>,
    },
    /// `info` is the opaque, already-serialized RouterInfo payload; parsing
    /// it is an external collaborator's job (see crate root docs).
    RouterInfo {
        flag: u8,
        info: Vec<u8>,
    },
    I2NPMessage {
        payload: Vec<u8>,
    },
    Termination {
        reason: u8,
        data: Vec<u8>,
    },
    Padding {
        bytes: Vec<u8>,
    },
}

impl Block {
    fn tag(&self) -> u8 {
        match self {
            Block::DateTime { .. } => TAG_DATE_TIME,
            Block::Options { .. } => TAG_OPTIONS,
            Block::RouterInfo { .. } => TAG_ROUTER_INFO,
            Block::I2NPMessage { .. } => TAG_I2NP_MESSAGE,
            Block::Termination { .. } => TAG_TERMINATION,
            Block::Padding { .. } => TAG_PADDING,
        }
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Block::DateTime { unix_time } => {
                let mut buf = [0u8; 4];
                BigEndian::write_u32(&mut buf, *unix_time);
                out.extend_from_slice(&buf);
            }
            Block::Options { pairs } => {
                for (key, value) in pairs {
                    out.push(key.len() as u8);
                    out.extend_from_slice(key);
                    out.push(value.len() as u8);
                    out.extend_from_slice(value);
                }
            }
            Block::RouterInfo { flag, info } => {
                out.push(*flag);
                out.extend_from_slice(info);
            }
            Block::I2NPMessage { payload } => out.extend_from_slice(payload),
            Block::Termination { reason, data } => {
                out.push(*reason);
                out.extend_from_slice(data);
            }
            Block::Padding { bytes } => out.extend_from_slice(bytes),
        }
    }

    /// Serializes this block (header + body) onto `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<(), BlockError> {
        let mut body = Vec::new();
        self.encode_body(&mut body);

        if body.len() > u16::MAX as usize {
            return Err(BlockError::TooLarge {
                what: "block body",
                max: u16::MAX as usize,
            });
        }
        if let Block::RouterInfo { info, .. } = self {
            if info.len() < MIN_ROUTER_INFO_LEN {
                return Err(BlockError::TooSmall {
                    what: "RouterInfo block",
                    min: MIN_ROUTER_INFO_LEN,
                });
            }
            if info.len() > MAX_ROUTER_INFO_LEN {
                return Err(BlockError::TooLarge {
                    what: "RouterInfo block",
                    max: MAX_ROUTER_INFO_LEN,
                });
            }
        }

        out.push(self.tag());
        let mut size_buf = [0u8; 2];
        BigEndian::write_u16(&mut size_buf, body.len() as u16);
        out.extend_from_slice(&size_buf);
        out.extend_from_slice(&body);
        Ok(())
    }

    /// Parses one block from the front of `input`, returning the block and
    /// the number of bytes consumed. Unknown tags fail with
    /// `InvalidBlockType`; a declared size that doesn't fit `input` fails
    /// with `InvalidLength`.
    pub fn deserialize(input: &[u8]) -> Result<(Block, usize), BlockError> {
        if input.len() < HEADER_LEN {
            return Err(BlockError::InvalidLength {
                declared: 0,
                remaining: input.len(),
            });
        }

        let tag = input[0];
        let size = BigEndian::read_u16(&input[1..3]) as usize;
        let body_end = HEADER_LEN + size;
        if body_end > input.len() {
            return Err(BlockError::InvalidLength {
                declared: size,
                remaining: input.len() - HEADER_LEN,
            });
        }
        let body = &input[HEADER_LEN..body_end];

        let block = match tag {
            TAG_DATE_TIME => {
                if body.len() != 4 {
                    return Err(BlockError::InvalidLength {
                        declared: size,
                        remaining: body.len(),
                    });
                }
                Block::DateTime {
                    unix_time: BigEndian::read_u32(body),
                }
            }
            TAG_OPTIONS => {
                let mut pairs = Vec::new();
                let mut i = 0;
                while i < body.len() {
                    let key_len = body[i] as usize;
                    i += 1;
                    if i + key_len > body.len() {
                        return Err(BlockError::InvalidLength {
                            declared: size,
                            remaining: body.len() - i,
                        });
                    }
                    let key = body[i..i + key_len].to_vec();
                    i += key_len;

                    if i >= body.len() {
                        return Err(BlockError::InvalidLength {
                            declared: size,
                            remaining: 0,
                        });
                    }
                    let value_len = body[i] as usize;
                    i += 1;
                    if i + value_len > body.len() {
                        return Err(BlockError::InvalidLength {
                            declared: size,
                            remaining: body.len() - i,
                        });
                    }
                    let value = body[i..i + value_len].to_vec();
                    i += value_len;

                    pairs.push((key, value));
                }
                Block::Options { pairs }
            }
            TAG_ROUTER_INFO => {
                if body.is_empty() {
                    return Err(BlockError::TooSmall {
                        what: "RouterInfo block",
                        min: MIN_ROUTER_INFO_LEN,
                    });
                }
                Block::RouterInfo {
                    flag: body[0],
                    info: body[1..].to_vec(),
                }
            }
            TAG_I2NP_MESSAGE => Block::I2NPMessage {
                payload: body.to_vec(),
            },
            TAG_TERMINATION => {
                if body.is_empty() {
                    return Err(BlockError::InvalidLength {
                        declared: size,
                        remaining: 0,
                    });
                }
                Block::Termination {
                    reason: body[0],
                    data: body[1..].to_vec(),
                }
            }
            TAG_PADDING => Block::Padding {
                bytes: body.to_vec(),
            },
            other => return Err(BlockError::InvalidBlockType { tag: other }),
        };

        Ok((block, body_end))
    }
}

/// A sequence of blocks sharing one AEAD-protected (or handshake-payload)
/// carrier. Enforces the list-level invariants spec.md calls out: the
/// serialized list must fit within `capacity` (the carrier size minus the
/// AEAD tag, when applicable), and only the final block may be `Padding`.
pub struct BlockList;

impl BlockList {
    /// Serializes `blocks` and fails with `CarrierOverflow` if the result
    /// would not fit `capacity` bytes, or `PaddingNotLast` if a non-final
    /// block is Padding.
    pub fn serialize_into(blocks: &[Block], capacity: usize) -> Result<Vec<u8>, BlockError> {
        for (i, block) in blocks.iter().enumerate() {
            if matches!(block, Block::Padding { .. }) && i + 1 != blocks.len() {
                return Err(BlockError::PaddingNotLast);
            }
        }

        let mut out = Vec::new();
        for block in blocks {
            block.serialize(&mut out)?;
        }

        if out.len() > capacity {
            return Err(BlockError::CarrierOverflow {
                total: out.len(),
                capacity,
            });
        }
        Ok(out)
    }

    /// Parses every block in `input` back to back. Trailing bytes that
    /// don't form a complete block are an error — a carrier's plaintext is
    /// either an exact concatenation of blocks or malformed.
    pub fn parse_from(mut input: &[u8]) -> Result<Vec<Block>, BlockError> {
        let mut blocks = Vec::new();
        while !input.is_empty() {
            let (block, consumed) = Block::deserialize(input)?;
            input = &input[consumed..];
            blocks.push(block);
        }
        Ok(blocks)
    }
}

use ntcp2_block::{Block, BlockList};
use ntcp2_crypto::X25519PublicKey;

use crate::error::HandshakeError;
use crate::handshake_state::{HandshakeState, Role};

const PART1_LEN: usize = 48;

pub struct SessionConfirmedOutput {
    pub message: Vec<u8>,
}

/// What the responder learns from message 3. Cross-checking `remote_static`
/// against the static key embedded in `router_info` is the caller's job —
/// this crate never parses RouterInfo bytes (an external collaborator's
/// format), it only enforces the block-composition rule §4.4.3 fixes.
pub struct SessionConfirmedRead {
    pub remote_static: X25519PublicKey,
    pub router_info: Vec<u8>,
    pub router_info_flag: u8,
    pub had_padding: bool,
}

/// Initiator side: `-> s, se`. Part 1 authenticates the initiator's static
/// key under the key left by SessionCreated's `ee`; part 2 (the block
/// payload) is sealed under the fresh key `se` installs.
pub fn write(
    state: &mut HandshakeState,
    m3p2_blocks: &[Block],
    m3p2_capacity: usize,
) -> Result<SessionConfirmedOutput, HandshakeError> {
    let _span = tracing::debug_span!("handshake", role = "initiator", phase = 3).entered();
    if state.role != Role::Initiator {
        return Err(HandshakeError::InvalidArgument("SessionConfirmed::write called by responder"));
    }

    let static_pub = state.local_static.public();
    let part1 = state.symmetric().encrypt_and_hash(static_pub.as_bytes());
    debug_assert_eq!(part1.len(), PART1_LEN);

    let remote_ephemeral = state
        .remote_ephemeral
        .ok_or(HandshakeError::InvalidArgument("SessionConfirmed::write before SessionCreated::read"))?;
    let se = state.local_static.diffie_hellman(&remote_ephemeral);
    state.symmetric().mix_key(&se);

    let plaintext = BlockList::serialize_into(m3p2_blocks, m3p2_capacity)?;
    let part2 = state.symmetric().encrypt_and_hash(&plaintext);

    let mut message = Vec::with_capacity(part1.len() + part2.len());
    message.extend_from_slice(&part1);
    message.extend_from_slice(&part2);

    Ok(SessionConfirmedOutput { message })
}

/// Responder side: decrypt part 1 to learn and authenticate the
/// initiator's static key, run `se`, then decrypt part 2 and enforce that
/// it contains exactly one RouterInfo block optionally followed by one
/// Padding block.
pub fn read(
    state: &mut HandshakeState,
    input: &[u8],
    m3p2_len: usize,
) -> Result<SessionConfirmedRead, HandshakeError> {
    let _span = tracing::debug_span!("handshake", role = "responder", phase = 3).entered();
    if state.role != Role::Responder {
        return Err(HandshakeError::InvalidArgument("SessionConfirmed::read called by initiator"));
    }
    if input.len() < PART1_LEN + m3p2_len {
        return Err(HandshakeError::InvalidLength {
            op: "SessionConfirmed::read",
            got: input.len(),
            min: PART1_LEN + m3p2_len,
            max: PART1_LEN + m3p2_len,
        });
    }

    let part1 = &input[0..PART1_LEN];
    let static_pub_bytes = state.symmetric().decrypt_and_hash(part1, "SessionConfirmed::read part1")?;
    if static_pub_bytes.len() != 32 {
        return Err(HandshakeError::InvalidLength {
            op: "SessionConfirmed::read part1",
            got: static_pub_bytes.len(),
            min: 32,
            max: 32,
        });
    }
    let mut static_pub_fixed = [0u8; 32];
    static_pub_fixed.copy_from_slice(&static_pub_bytes);
    let remote_static = X25519PublicKey::from(static_pub_fixed);

    let local_ephemeral = state
        .local_ephemeral
        .as_mut()
        .ok_or(HandshakeError::InvalidArgument("SessionConfirmed::read before SessionCreated::write"))?;
    let se = local_ephemeral.diffie_hellman(&remote_static);
    local_ephemeral.destroy();
    state.symmetric().mix_key(&se);
    state.remote_static = remote_static;

    let part2 = &input[PART1_LEN..PART1_LEN + m3p2_len];
    let plaintext = state.symmetric().decrypt_and_hash(part2, "SessionConfirmed::read part2")?;

    let blocks = BlockList::parse_from(&plaintext)?;
    let (router_info, router_info_flag, had_padding) = validate_part2_blocks(&blocks)?;

    Ok(SessionConfirmedRead {
        remote_static,
        router_info,
        router_info_flag,
        had_padding,
    })
}

fn validate_part2_blocks(blocks: &[Block]) -> Result<(Vec<u8>, u8, bool), HandshakeError> {
    match blocks {
        [Block::RouterInfo { flag, info }] => Ok((info.clone(), *flag, false)),
        [Block::RouterInfo { flag, info }, Block::Padding { .. }] => Ok((info.clone(), *flag, true)),
        _ => {
            tracing::warn!(block_count = blocks.len(), "SessionConfirmed::read: part 2 is not RouterInfo[, Padding]");
            Err(HandshakeError::InvalidM3P2 { source: None })
        }
    }
}

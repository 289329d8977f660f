use rand_core::{CryptoRng, RngCore};

use ntcp2_crypto::{aes_obfuscation, AesIv, IdentHash};

use crate::error::HandshakeError;
use crate::handshake_state::{HandshakeState, Role};
use crate::options::{self, HandshakeOptions};

/// Message 2 of the handshake, `<- e, ee`. Always exactly 64 bytes plus
/// the responder-chosen padding.
pub struct SessionCreatedOutput {
    pub message: Vec<u8>,
}

pub struct SessionCreatedRead {
    pub pad_len: u16,
    pub consumed: usize,
}

const MIN_MESSAGE_LEN: usize = 32 + 32;

/// Responder side: obfuscate a fresh ephemeral key under the IV chained
/// from SessionRequest, run `e, ee`, seal the (mostly unused) options,
/// append its own padding.
pub fn write<R: RngCore + CryptoRng>(
    state: &mut HandshakeState,
    local_ident_hash: &IdentHash,
    request_ciphertext_tail: &[u8; 16],
    pad_len: u16,
    timestamp: u32,
    padding: &[u8],
    rng: &mut R,
) -> Result<SessionCreatedOutput, HandshakeError> {
    let _span = tracing::debug_span!("handshake", role = "responder", phase = 2).entered();
    if state.role != Role::Responder {
        return Err(HandshakeError::InvalidArgument("SessionCreated::write called by initiator"));
    }
    if padding.len() != pad_len as usize {
        return Err(HandshakeError::InvalidPadding {
            op: "SessionCreated::write",
            got: padding.len() as u16,
            min: pad_len,
            max: pad_len,
        });
    }

    let mut ephemeral = ntcp2_crypto::EphemeralKeyPair::generate(rng);
    let e_pub = ephemeral.public();

    state.symmetric().mix_hash(e_pub.as_bytes());
    let remote_ephemeral = state
        .remote_ephemeral
        .ok_or(HandshakeError::InvalidArgument("SessionCreated::write before SessionRequest::read"))?;
    let ee = ephemeral.diffie_hellman(&remote_ephemeral);
    state.symmetric().mix_key(&ee);
    // The responder's ephemeral secret survives in `state.local_ephemeral`:
    // SessionConfirmed's `se` token still needs it.
    state.local_ephemeral = Some(ephemeral);

    let options = HandshakeOptions {
        version: options::CURRENT_VERSION,
        m3p2_len: 0,
        pad_len,
        timestamp,
    };
    let sealed_options = state.symmetric().encrypt_and_hash(&options.encode());
    debug_assert_eq!(sealed_options.len(), 32);

    let iv = aes_obfuscation::chained_iv(request_ciphertext_tail);
    let obfuscated_e = aes_obfuscation::obfuscate(local_ident_hash, &iv, e_pub.as_bytes());

    let mut message = Vec::with_capacity(MIN_MESSAGE_LEN + padding.len());
    message.extend_from_slice(&obfuscated_e);
    message.extend_from_slice(&sealed_options);
    message.extend_from_slice(padding);

    Ok(SessionCreatedOutput { message })
}

/// Initiator side: un-obfuscate under the IV chained from its own
/// SessionRequest, run `e, ee`, decrypt options, validate padding policy.
pub fn read(
    state: &mut HandshakeState,
    input: &[u8],
    remote_ident_hash: &IdentHash,
    request_ciphertext_tail: &[u8; 16],
    min_padding: u16,
    max_padding: u16,
) -> Result<SessionCreatedRead, HandshakeError> {
    let _span = tracing::debug_span!("handshake", role = "initiator", phase = 2).entered();
    if state.role != Role::Initiator {
        return Err(HandshakeError::InvalidArgument("SessionCreated::read called by responder"));
    }
    if input.len() < MIN_MESSAGE_LEN {
        return Err(HandshakeError::InvalidLength {
            op: "SessionCreated::read",
            got: input.len(),
            min: MIN_MESSAGE_LEN,
            max: usize::MAX,
        });
    }

    let mut obfuscated_e = [0u8; 32];
    obfuscated_e.copy_from_slice(&input[0..32]);
    let iv = aes_obfuscation::chained_iv(request_ciphertext_tail);
    let e_pub_bytes = aes_obfuscation::deobfuscate(remote_ident_hash, &iv, &obfuscated_e);
    let e_pub = ntcp2_crypto::X25519PublicKey::from(e_pub_bytes);

    state.symmetric().mix_hash(e_pub.as_bytes());
    let local_ephemeral = state
        .local_ephemeral
        .as_mut()
        .ok_or(HandshakeError::InvalidArgument("SessionCreated::read before SessionRequest::write"))?;
    let ee = local_ephemeral.diffie_hellman(&e_pub);
    local_ephemeral.destroy();
    state.symmetric().mix_key(&ee);

    let sealed_options = &input[32..64];
    let options_bytes = state
        .symmetric()
        .decrypt_and_hash(sealed_options, "SessionCreated::read")?;
    if options_bytes.len() != options::LEN {
        return Err(HandshakeError::InvalidLength {
            op: "SessionCreated::read options",
            got: options_bytes.len(),
            min: options::LEN,
            max: options::LEN,
        });
    }
    let mut options_fixed = [0u8; options::LEN];
    options_fixed.copy_from_slice(&options_bytes);
    let options = HandshakeOptions::decode(&options_fixed);

    if options.pad_len < min_padding || options.pad_len > max_padding {
        tracing::warn!(got = options.pad_len, min_padding, max_padding, "SessionCreated::read: invalid padding length");
        return Err(HandshakeError::InvalidPadding {
            op: "SessionCreated::read",
            got: options.pad_len,
            min: min_padding,
            max: max_padding,
        });
    }

    // See the matching comment in `session_request::read`: `consumed` is
    // informational, not a bound on `input`'s length.
    let total_len = MIN_MESSAGE_LEN + options.pad_len as usize;

    state.remote_ephemeral = Some(e_pub);

    Ok(SessionCreatedRead {
        pad_len: options.pad_len,
        consumed: total_len,
    })
}

use rand_core::{CryptoRng, RngCore};

use ntcp2_crypto::{aes_obfuscation, AesIv, IdentHash};

use crate::error::HandshakeError;
use crate::handshake_state::{HandshakeState, Role};
use crate::options::{self, HandshakeOptions};

/// Message 1 of the handshake, `-> e, es`. Length is always `64 +
/// pad_len`. Hand back to the caller as much of the wire state as the next
/// stage (SessionCreated) needs rather than making it recompute anything.
pub struct SessionRequestOutput {
    pub message: Vec<u8>,
    /// The last 16 bytes of this message's sealed options — the chained IV
    /// input for SessionCreated's AES-CBC obfuscation.
    pub ciphertext_tail: [u8; 16],
}

pub struct SessionRequestRead {
    pub options: HandshakeOptions,
    pub ciphertext_tail: [u8; 16],
    pub consumed: usize,
}

const MIN_MESSAGE_LEN: usize = 32 + 32;

/// Initiator side: obfuscate the fresh ephemeral key, run the `e, es`
/// tokens, seal the options, and append padding.
pub fn write<R: RngCore + CryptoRng>(
    state: &mut HandshakeState,
    remote_ident_hash: &IdentHash,
    remote_aes_iv: &AesIv,
    m3p2_len: u16,
    pad_len: u16,
    timestamp: u32,
    padding: &[u8],
    rng: &mut R,
) -> Result<SessionRequestOutput, HandshakeError> {
    let _span = tracing::debug_span!("handshake", role = "initiator", phase = 1).entered();
    if state.role != Role::Initiator {
        return Err(HandshakeError::InvalidArgument("SessionRequest::write called by responder"));
    }
    if padding.len() != pad_len as usize {
        return Err(HandshakeError::InvalidPadding {
            op: "SessionRequest::write",
            got: padding.len() as u16,
            min: pad_len,
            max: pad_len,
        });
    }

    let mut ephemeral = ntcp2_crypto::EphemeralKeyPair::generate(rng);
    let e_pub = ephemeral.public();

    state.symmetric().mix_hash(e_pub.as_bytes());
    // `es` token: DH(e, rs) — the fresh ephemeral against the responder's
    // known static key. The ephemeral secret itself survives in
    // `state.local_ephemeral`: SessionCreated's `ee` token still needs it.
    let es = ephemeral.diffie_hellman(&state.remote_static);
    state.symmetric().mix_key(&es);
    state.local_ephemeral = Some(ephemeral);

    let options = HandshakeOptions {
        version: options::CURRENT_VERSION,
        m3p2_len,
        pad_len,
        timestamp,
    };
    let sealed_options = state.symmetric().encrypt_and_hash(&options.encode());
    debug_assert_eq!(sealed_options.len(), 32);

    let obfuscated_e = aes_obfuscation::obfuscate(remote_ident_hash, remote_aes_iv, e_pub.as_bytes());

    let mut message = Vec::with_capacity(MIN_MESSAGE_LEN + padding.len());
    message.extend_from_slice(&obfuscated_e);
    message.extend_from_slice(&sealed_options);
    message.extend_from_slice(padding);

    let mut ciphertext_tail = [0u8; 16];
    ciphertext_tail.copy_from_slice(&sealed_options[16..32]);

    Ok(SessionRequestOutput { message, ciphertext_tail })
}

/// Responder side: un-obfuscate the ephemeral key, run `e, es`, decrypt
/// the options, and validate padding/timestamp. Padding bytes themselves
/// are never authenticated at this stage (§4.4.1) — only their declared
/// length is checked against policy.
pub fn read(
    state: &mut HandshakeState,
    input: &[u8],
    local_ident_hash: &IdentHash,
    local_aes_iv: &AesIv,
    now: u32,
    clock_skew_tolerance_seconds: u32,
    min_padding: u16,
    max_padding: u16,
) -> Result<SessionRequestRead, HandshakeError> {
    let _span = tracing::debug_span!("handshake", role = "responder", phase = 1).entered();
    if state.role != Role::Responder {
        return Err(HandshakeError::InvalidArgument("SessionRequest::read called by initiator"));
    }
    if input.len() < MIN_MESSAGE_LEN {
        return Err(HandshakeError::InvalidLength {
            op: "SessionRequest::read",
            got: input.len(),
            min: MIN_MESSAGE_LEN,
            max: usize::MAX,
        });
    }

    let mut obfuscated_e = [0u8; 32];
    obfuscated_e.copy_from_slice(&input[0..32]);
    let e_pub_bytes = aes_obfuscation::deobfuscate(local_ident_hash, local_aes_iv, &obfuscated_e);
    let e_pub = ntcp2_crypto::X25519PublicKey::from(e_pub_bytes);

    state.symmetric().mix_hash(e_pub.as_bytes());
    let es = state.local_static.diffie_hellman(&e_pub);
    state.symmetric().mix_key(&es);

    let sealed_options = &input[32..64];
    let options_bytes = state
        .symmetric()
        .decrypt_and_hash(sealed_options, "SessionRequest::read")?;
    if options_bytes.len() != options::LEN {
        return Err(HandshakeError::InvalidLength {
            op: "SessionRequest::read options",
            got: options_bytes.len(),
            min: options::LEN,
            max: options::LEN,
        });
    }
    let mut options_fixed = [0u8; options::LEN];
    options_fixed.copy_from_slice(&options_bytes);
    let options = HandshakeOptions::decode(&options_fixed);

    if options.pad_len < min_padding || options.pad_len > max_padding {
        tracing::warn!(got = options.pad_len, min_padding, max_padding, "SessionRequest::read: invalid padding length");
        return Err(HandshakeError::InvalidPadding {
            op: "SessionRequest::read",
            got: options.pad_len,
            min: min_padding,
            max: max_padding,
        });
    }

    let skew = (options.timestamp as i64 - now as i64).unsigned_abs() as u32;
    if skew > clock_skew_tolerance_seconds {
        tracing::warn!(skew, clock_skew_tolerance_seconds, "SessionRequest::read: timestamp outside allowed skew");
        return Err(HandshakeError::InvalidTimestamp {
            op: "SessionRequest::read",
            got: options.timestamp,
            tolerance_seconds: clock_skew_tolerance_seconds,
        });
    }

    // `consumed` tells the caller how many wire bytes this message occupies
    // in total (header + padding); padding itself need not already be
    // present in `input` — callers driving a live socket read it
    // separately once they know its length.
    let total_len = MIN_MESSAGE_LEN + options.pad_len as usize;

    let mut ciphertext_tail = [0u8; 16];
    ciphertext_tail.copy_from_slice(&sealed_options[16..32]);

    state.remote_ephemeral = Some(e_pub);

    Ok(SessionRequestRead {
        options,
        ciphertext_tail,
        consumed: total_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntcp2_crypto::{AesIv, IdentHash, StaticKeyPair};
    use rand::rngs::OsRng;

    fn keypair() -> StaticKeyPair {
        StaticKeyPair::generate(&mut OsRng)
    }

    #[test]
    fn initiator_and_responder_agree_after_message_one() {
        let mut rng = OsRng;
        let responder_static = keypair();
        let initiator_static = keypair();
        let ident_hash = IdentHash([9u8; 32]);
        let aes_iv = AesIv([1u8; 16]);

        let mut initiator_state = HandshakeState::new(
            Role::Initiator,
            initiator_static.clone(),
            responder_static.public(),
        );
        let mut responder_state = HandshakeState::new(
            Role::Responder,
            responder_static.clone(),
            responder_static.public(),
        );

        let output = write(
            &mut initiator_state,
            &ident_hash,
            &aes_iv,
            500,
            16,
            1_700_000_000,
            &[0u8; 16],
            &mut rng,
        )
        .unwrap();

        let parsed = read(
            &mut responder_state,
            &output.message,
            &ident_hash,
            &aes_iv,
            1_700_000_000,
            60,
            0,
            64,
        )
        .unwrap();

        assert_eq!(parsed.options.m3p2_len, 500);
        assert_eq!(parsed.options.pad_len, 16);
        assert_eq!(parsed.ciphertext_tail, output.ciphertext_tail);
        assert_eq!(initiator_state.h(), responder_state.h());
        assert_eq!(initiator_state.ck(), responder_state.ck());
    }

    #[test]
    fn padding_outside_policy_bounds_is_rejected() {
        let mut rng = OsRng;
        let responder_static = keypair();
        let initiator_static = keypair();
        let ident_hash = IdentHash([4u8; 32]);
        let aes_iv = AesIv([2u8; 16]);

        let mut initiator_state = HandshakeState::new(
            Role::Initiator,
            initiator_static,
            responder_static.public(),
        );
        let mut responder_state = HandshakeState::new(
            Role::Responder,
            responder_static.clone(),
            responder_static.public(),
        );

        let output = write(
            &mut initiator_state,
            &ident_hash,
            &aes_iv,
            0,
            200,
            1_700_000_000,
            &vec![0u8; 200],
            &mut rng,
        )
        .unwrap();

        let err = read(
            &mut responder_state,
            &output.message,
            &ident_hash,
            &aes_iv,
            1_700_000_000,
            60,
            0,
            64,
        )
        .unwrap_err();

        assert!(matches!(err, HandshakeError::InvalidPadding { .. }));
    }

    #[test]
    fn timestamp_outside_skew_window_is_rejected() {
        let mut rng = OsRng;
        let responder_static = keypair();
        let initiator_static = keypair();
        let ident_hash = IdentHash([4u8; 32]);
        let aes_iv = AesIv([2u8; 16]);

        let mut initiator_state = HandshakeState::new(
            Role::Initiator,
            initiator_static,
            responder_static.public(),
        );
        let mut responder_state = HandshakeState::new(
            Role::Responder,
            responder_static.clone(),
            responder_static.public(),
        );

        let output = write(
            &mut initiator_state,
            &ident_hash,
            &aes_iv,
            0,
            0,
            1_000_000,
            &[],
            &mut rng,
        )
        .unwrap();

        let err = read(
            &mut responder_state,
            &output.message,
            &ident_hash,
            &aes_iv,
            1_700_000_000,
            60,
            0,
            64,
        )
        .unwrap_err();

        assert!(matches!(err, HandshakeError::InvalidTimestamp { .. }));
    }

    #[test]
    fn padding_at_exact_min_and_max_bounds_is_accepted() {
        let ident_hash = IdentHash([4u8; 32]);
        let aes_iv = AesIv([2u8; 16]);
        let min = 10u16;
        let max = 20u16;

        for pad_len in [min, max] {
            let mut rng = OsRng;
            let responder_static = keypair();
            let initiator_static = keypair();
            let mut initiator_state = HandshakeState::new(Role::Initiator, initiator_static, responder_static.public());
            let mut responder_state = HandshakeState::new(Role::Responder, responder_static.clone(), responder_static.public());

            let output = write(
                &mut initiator_state,
                &ident_hash,
                &aes_iv,
                0,
                pad_len,
                1_700_000_000,
                &vec![0u8; pad_len as usize],
                &mut rng,
            )
            .unwrap();

            let parsed = read(&mut responder_state, &output.message, &ident_hash, &aes_iv, 1_700_000_000, 60, min, max);
            assert!(parsed.is_ok(), "pad_len {pad_len} at the policy bound must be accepted");
        }
    }

    #[test]
    fn padding_one_outside_min_or_max_bound_is_rejected() {
        let ident_hash = IdentHash([4u8; 32]);
        let aes_iv = AesIv([2u8; 16]);
        let min = 10u16;
        let max = 20u16;

        for pad_len in [min - 1, max + 1] {
            let mut rng = OsRng;
            let responder_static = keypair();
            let initiator_static = keypair();
            let mut initiator_state = HandshakeState::new(Role::Initiator, initiator_static, responder_static.public());
            let mut responder_state = HandshakeState::new(Role::Responder, responder_static.clone(), responder_static.public());

            let output = write(
                &mut initiator_state,
                &ident_hash,
                &aes_iv,
                0,
                pad_len,
                1_700_000_000,
                &vec![0u8; pad_len as usize],
                &mut rng,
            )
            .unwrap();

            let err = read(&mut responder_state, &output.message, &ident_hash, &aes_iv, 1_700_000_000, 60, min, max).unwrap_err();
            assert!(matches!(err, HandshakeError::InvalidPadding { .. }), "pad_len {pad_len} must be rejected");
        }
    }

    #[test]
    fn timestamp_at_exact_skew_tolerance_is_accepted() {
        let ident_hash = IdentHash([4u8; 32]);
        let aes_iv = AesIv([2u8; 16]);
        let now = 1_700_000_000u32;
        let tolerance = 60u32;

        for timestamp in [now - tolerance, now + tolerance] {
            let mut rng = OsRng;
            let responder_static = keypair();
            let initiator_static = keypair();
            let mut initiator_state = HandshakeState::new(Role::Initiator, initiator_static, responder_static.public());
            let mut responder_state = HandshakeState::new(Role::Responder, responder_static.clone(), responder_static.public());

            let output = write(&mut initiator_state, &ident_hash, &aes_iv, 0, 0, timestamp, &[], &mut rng).unwrap();

            let parsed = read(&mut responder_state, &output.message, &ident_hash, &aes_iv, now, tolerance, 0, 64);
            assert!(parsed.is_ok(), "timestamp {timestamp} at the tolerance bound must be accepted");
        }
    }

    #[test]
    fn timestamp_one_second_beyond_skew_tolerance_is_rejected() {
        let ident_hash = IdentHash([4u8; 32]);
        let aes_iv = AesIv([2u8; 16]);
        let now = 1_700_000_000u32;
        let tolerance = 60u32;

        for timestamp in [now - tolerance - 1, now + tolerance + 1] {
            let mut rng = OsRng;
            let responder_static = keypair();
            let initiator_static = keypair();
            let mut initiator_state = HandshakeState::new(Role::Initiator, initiator_static, responder_static.public());
            let mut responder_state = HandshakeState::new(Role::Responder, responder_static.clone(), responder_static.public());

            let output = write(&mut initiator_state, &ident_hash, &aes_iv, 0, 0, timestamp, &[], &mut rng).unwrap();

            let err = read(&mut responder_state, &output.message, &ident_hash, &aes_iv, now, tolerance, 0, 64).unwrap_err();
            assert!(matches!(err, HandshakeError::InvalidTimestamp { .. }), "timestamp {timestamp} must be rejected");
        }
    }
}

use thiserror::Error;

/// Handshake-layer failures. Every handshake error is fatal to the session
/// (see the core's error propagation policy): the caller closes the
/// socket and blacklists the peer.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("{op}: invalid message length ({got}, expected {min}..={max})")]
    InvalidLength {
        op: &'static str,
        got: usize,
        min: usize,
        max: usize,
    },

    #[error("{op}: invalid padding length {got} (expected {min}..={max})")]
    InvalidPadding {
        op: &'static str,
        got: u16,
        min: u16,
        max: u16,
    },

    #[error("{op}: timestamp {got} outside allowed skew of remote clock (tolerance {tolerance_seconds}s)")]
    InvalidTimestamp {
        op: &'static str,
        got: u32,
        tolerance_seconds: u32,
    },

    #[error("{op}: AEAD authentication failed")]
    DecryptFailure {
        op: &'static str,
        #[source]
        source: ntcp2_crypto::CryptoError,
    },

    #[error("SessionConfirmed: RouterInfo static key does not match the key authenticated in part 1")]
    IdentityMismatch,

    #[error("SessionConfirmed: part 2 blocks must be exactly one RouterInfo block optionally followed by Padding")]
    InvalidM3P2 {
        #[source]
        source: Option<ntcp2_block::BlockError>,
    },
}

impl From<ntcp2_crypto::CryptoError> for HandshakeError {
    /// Keeps the original `CryptoError` attached as `#[source]` rather than
    /// discarding it; the failing operation name is recovered from the
    /// wrapped error itself since every `CryptoError` variant carries one.
    fn from(err: ntcp2_crypto::CryptoError) -> Self {
        let op = match &err {
            ntcp2_crypto::CryptoError::DecryptFailure { op }
            | ntcp2_crypto::CryptoError::InvalidKeyLength { op }
            | ntcp2_crypto::CryptoError::NonceExhausted { op } => *op,
        };
        HandshakeError::DecryptFailure { op, source: err }
    }
}

impl From<ntcp2_block::BlockError> for HandshakeError {
    /// Keeps the original `BlockError` attached as `#[source]`. The
    /// composition check in `session_confirmed::validate_part2_blocks`
    /// constructs `InvalidM3P2 { source: None }` directly instead of going
    /// through this conversion, since it has no underlying `BlockError` to
    /// attach — it rejects a payload that parsed fine but isn't shaped
    /// `RouterInfo[, Padding]`.
    fn from(err: ntcp2_block::BlockError) -> Self {
        HandshakeError::InvalidM3P2 { source: Some(err) }
    }
}

use thiserror::Error;

/// Session-layer failures. Handshake errors and data-phase AEAD failures
/// are fatal (caller closes the socket and blacklists the peer);
/// `NotReady` and `DuplicateSession` are recoverable and kill nothing.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] ntcp2_handshake::HandshakeError),

    #[error("data phase payload did not parse as a block sequence: {0}")]
    Block(#[from] ntcp2_block::BlockError),

    #[error("{0}: null argument")]
    InvalidArgument(&'static str),

    #[error("session is not in DataPhase (Write/Read attempted in state {state})")]
    NotReady { state: &'static str },

    #[error("a session to this peer's static key already exists")]
    DuplicateSession,

    #[error("socket error during {op}: {source}")]
    SocketError {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled by Stop()")]
    Cancelled,

    #[error("per-direction nonce exhausted; session must terminate rather than wrap")]
    NonceExhausted,
}

impl SessionError {
    /// Whether this error is fatal to the *session* per the propagation
    /// policy: everything except `NotReady`/`DuplicateSession` kills it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::NotReady { .. } | SessionError::DuplicateSession)
    }
}

//! NTCP2 transport core: the obfuscated Noise_XK handshake, the framed
//! AEAD data phase that follows it, and the session manager that owns a
//! router's live connections.
//!
//! This crate re-exports the public surface of its four member crates so
//! a caller depends on one thing. `RouterInfoProvider` is the seam: supply
//! an implementation backed by your own RouterInfo type and this crate
//! never needs to know that format.

pub use ntcp2_session::{
    AddressFamily, Config, InvalidConfig, Listener, ListenerSessions, RouterInfoProvider, Session, SessionManager,
};

pub use ntcp2_block::{Block, BlockError};
pub use ntcp2_crypto::{AesIv, CryptoError, IdentHash, X25519PublicKey};
pub use ntcp2_handshake::HandshakeError;
pub use ntcp2_session::SessionError;

use thiserror::Error;

/// The taxonomy from every layer, unified. A caller matching on this
/// doesn't need to know which crate an error originated in; `#[source]`
/// keeps the original cause attached for logging.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Config(#[from] InvalidConfig),
}

impl Error {
    /// Mirrors `SessionError::is_fatal` for the layers that have a
    /// recoverable/fatal distinction; errors from crates with no such
    /// distinction (crypto, block, handshake) are always fatal since they
    /// only ever surface wrapped in a fatal `SessionError` in practice.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Session(err) => err.is_fatal(),
            Error::Config(_) => false,
            _ => true,
        }
    }
}

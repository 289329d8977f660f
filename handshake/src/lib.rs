//! The Noise_XK(sk) engine (`HandshakeState`/`SymmetricState`) and the
//! three message processors that drive it: SessionRequest, SessionCreated,
//! SessionConfirmed.
//!
//! Each processor is a pair of free functions, `write`/`read`, rather than
//! an object with virtual `Write`/`Read` methods: the role split is a
//! two-way branch the caller already knows the answer to (it knows whether
//! it's the initiator or the responder), so dynamic dispatch buys nothing.

pub mod error;
pub mod handshake_state;
pub mod options;
pub mod session_confirmed;
pub mod session_created;
pub mod session_request;
pub mod split;
pub mod symmetric;

pub use error::HandshakeError;
pub use handshake_state::{HandshakeState, Role};
pub use options::HandshakeOptions;
pub use split::{split, DataPhaseKeys};
pub use symmetric::{SymmetricState, PROTOCOL_NAME};

use std::net::TcpStream;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use tracing::{info, warn};

use ntcp2_block::Block;
use ntcp2_crypto::{StaticKeyPair, X25519PublicKey};
use ntcp2_handshake::{session_confirmed, session_created, session_request, split, HandshakeState, Role};

use crate::config::Config;
use crate::data_phase::DataPhase;
use crate::error::SessionError;
use crate::router_info::{AddressFamily, RouterInfoProvider};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Uninitialized,
    HandshakeInProgress,
    DataPhase,
    Terminating,
    Terminated,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Uninitialized => "Uninitialized",
            State::HandshakeInProgress => "HandshakeInProgress",
            State::DataPhase => "DataPhase",
            State::Terminating => "Terminating",
            State::Terminated => "Terminated",
        }
    }
}

/// One NTCP2 connection: a TCP socket, the handshake state that drives it
/// to readiness, and the framed data phase that follows. Owned exclusively
/// by whoever created it (the manager, in the common case) — see §5.
pub struct Session {
    socket: TcpStream,
    role: Role,
    state: State,
    data_phase: Option<DataPhase>,
    remote_static: Option<X25519PublicKey>,
    local_router_info: Arc<dyn RouterInfoProvider>,
}

impl Session {
    /// Initiator path: connect to one of `remote`'s published addresses
    /// and drive messages 1–3 to completion before returning. A null
    /// `remote` fails immediately with `InvalidArgument`, matching the
    /// core's null-RouterInfo rejection rule.
    pub fn connect(
        local_router_info: Arc<dyn RouterInfoProvider>,
        local_static: StaticKeyPair,
        remote_router_info: Option<Arc<dyn RouterInfoProvider>>,
        config: &Config,
        prefer_v6: bool,
    ) -> Result<Self, SessionError> {
        let remote = remote_router_info
            .ok_or(SessionError::InvalidArgument("Session::connect: remote RouterInfo"))?;

        let primary = if prefer_v6 { AddressFamily::V6 } else { AddressFamily::V4 };
        let fallback = if prefer_v6 { AddressFamily::V4 } else { AddressFamily::V6 };
        let addr = remote
            .addresses(primary)
            .into_iter()
            .next()
            .or_else(|| remote.addresses(fallback).into_iter().next())
            .ok_or(SessionError::InvalidArgument("Session::connect: remote has no published addresses"))?;

        let socket = TcpStream::connect(addr)
            .map_err(|source| SessionError::SocketError { op: "Session::connect", source })?;

        let handshake_state = HandshakeState::new(Role::Initiator, local_static, remote.static_pub());

        let mut session = Session {
            socket,
            role: Role::Initiator,
            state: State::HandshakeInProgress,
            data_phase: None,
            remote_static: None,
            local_router_info,
        };

        info!(%addr, "Uninitialized -> HandshakeInProgress (initiator)");
        if let Err(err) = session.run_initiator_handshake(handshake_state, remote.as_ref(), config) {
            warn!(error = %err, "initiator handshake failed");
            return Err(err);
        }
        Ok(session)
    }

    /// Responder path: drive messages 1–3 on an already-accepted socket.
    pub fn accept(
        socket: TcpStream,
        local_router_info: Arc<dyn RouterInfoProvider>,
        local_static: StaticKeyPair,
        config: &Config,
    ) -> Result<Self, SessionError> {
        let handshake_state = HandshakeState::new(Role::Responder, local_static.clone(), local_static.public());

        let mut session = Session {
            socket,
            role: Role::Responder,
            state: State::HandshakeInProgress,
            data_phase: None,
            remote_static: None,
            local_router_info,
        };

        info!("Uninitialized -> HandshakeInProgress (responder)");
        if let Err(err) = session.run_responder_handshake(handshake_state, config) {
            warn!(error = %err, "responder handshake failed");
            return Err(err);
        }
        Ok(session)
    }

    fn run_initiator_handshake(
        &mut self,
        mut state: HandshakeState,
        remote: &dyn RouterInfoProvider,
        config: &Config,
    ) -> Result<(), SessionError> {
        let mut rng = rand::thread_rng();

        let pad_len = padding_len(&mut rng, config.min_padding_request, config.max_padding_request);
        let mut padding = vec![0u8; pad_len as usize];
        rng.fill_bytes(&mut padding);

        // The wire length of SessionConfirmed part 2 must be declared in
        // SessionRequest's options before message 1 is even sent, so the
        // part-2 block payload is built (but not yet sealed) up front.
        let m3p2_blocks = self.confirmed_blocks(&mut rng, config);
        let m3p2_plain_len = ntcp2_block::BlockList::serialize_into(&m3p2_blocks, u16::MAX as usize)
            .map_err(ntcp2_handshake::HandshakeError::from)?
            .len();
        let m3p2_len = (m3p2_plain_len + 16) as u16;

        let request = session_request::write(
            &mut state,
            &remote.ident_hash(),
            &remote.aes_iv(),
            m3p2_len,
            pad_len,
            now_unix(),
            &padding,
            &mut rng,
        )
        .map_err(SessionError::from)?;
        write_all(&mut self.socket, &request.message, "SessionRequest")?;

        let created_header = read_exact_vec(&mut self.socket, 64, "SessionCreated header")?;
        let created = session_created::read(
            &mut state,
            &created_header,
            &remote.ident_hash(),
            &request.ciphertext_tail,
            config.min_padding_created,
            config.max_padding_created,
        )
        .map_err(SessionError::from)?;
        if created.consumed > 64 {
            let _ = read_exact_vec(&mut self.socket, created.consumed - 64, "SessionCreated padding")?;
        }

        let confirmed =
            session_confirmed::write(&mut state, &m3p2_blocks, u16::MAX as usize).map_err(SessionError::from)?;
        write_all(&mut self.socket, &confirmed.message, "SessionConfirmed")?;

        self.remote_static = Some(remote.static_pub());
        self.finish_handshake(&state);
        Ok(())
    }

    /// The block payload SessionConfirmed part 2 carries: this router's
    /// own RouterInfo, optionally followed by a Padding block sized within
    /// `[min_padding_confirmed, max_padding_confirmed]`.
    fn confirmed_blocks<R: RngCore>(&self, rng: &mut R, config: &Config) -> Vec<Block> {
        let mut blocks = vec![Block::RouterInfo { flag: 0, info: self.local_router_info.serialized() }];
        let pad_len = padding_len(rng, config.min_padding_confirmed, config.max_padding_confirmed);
        if pad_len > 0 {
            let mut bytes = vec![0u8; pad_len as usize];
            rng.fill_bytes(&mut bytes);
            blocks.push(Block::Padding { bytes });
        }
        blocks
    }

    fn run_responder_handshake(&mut self, mut state: HandshakeState, config: &Config) -> Result<(), SessionError> {
        let mut rng = rand::thread_rng();

        let header = read_exact_vec(&mut self.socket, 64, "SessionRequest header")?;
        let request = session_request::read(
            &mut state,
            &header,
            &self.local_router_info.ident_hash(),
            &self.local_router_info.aes_iv(),
            now_unix(),
            config.clock_skew_tolerance_seconds,
            config.min_padding_request,
            config.max_padding_request,
        )
        .map_err(SessionError::from)?;
        if request.consumed > 64 {
            let _ = read_exact_vec(&mut self.socket, request.consumed - 64, "SessionRequest padding")?;
        }

        let pad_len = padding_len(&mut rng, config.min_padding_created, config.max_padding_created);
        let mut padding = vec![0u8; pad_len as usize];
        rng.fill_bytes(&mut padding);

        let created = session_created::write(
            &mut state,
            &self.local_router_info.ident_hash(),
            &request.ciphertext_tail,
            pad_len,
            now_unix(),
            &padding,
            &mut rng,
        )
        .map_err(SessionError::from)?;
        write_all(&mut self.socket, &created.message, "SessionCreated")?;

        let m3p2_len = request.options.m3p2_len as usize;
        let confirmed_bytes = read_exact_vec(&mut self.socket, 48 + m3p2_len, "SessionConfirmed")?;
        let confirmed = session_confirmed::read(&mut state, &confirmed_bytes, m3p2_len).map_err(SessionError::from)?;

        let claimed_static = self
            .local_router_info
            .extract_static_pub(&confirmed.router_info)
            .ok_or(ntcp2_handshake::HandshakeError::IdentityMismatch)?;
        if claimed_static.as_bytes() != confirmed.remote_static.as_bytes() {
            warn!("SessionConfirmed: RouterInfo static key does not match the key authenticated in part 1");
            return Err(ntcp2_handshake::HandshakeError::IdentityMismatch.into());
        }

        self.remote_static = Some(confirmed.remote_static);
        self.finish_handshake(&state);
        Ok(())
    }

    fn finish_handshake(&mut self, state: &HandshakeState) {
        let keys = split(state);
        self.data_phase = Some(DataPhase::from_split(&keys, self.role));
        self.state = State::DataPhase;
        info!(role = ?self.role, "HandshakeInProgress -> DataPhase");
    }

    /// Blocks until `ready()`. Since every path to readiness above is
    /// already fully synchronous, this degrades to a state check: there's
    /// no partial-progress state to wait out.
    pub fn wait(&self) -> Result<(), SessionError> {
        if self.ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady { state: self.state.name() })
        }
    }

    pub fn write(&mut self, blocks: &[Block]) -> Result<(), SessionError> {
        if self.state != State::DataPhase {
            return Err(SessionError::NotReady { state: self.state.name() });
        }
        let result = self.data_phase.as_mut().expect("DataPhase state implies data_phase is set").write(&mut self.socket, blocks);
        if let Err(err) = &result {
            warn!(error = %err, "DataPhase -> Terminated (write failure)");
            self.state = State::Terminated;
        }
        result
    }

    pub fn read(&mut self) -> Result<Vec<Block>, SessionError> {
        if self.state != State::DataPhase {
            return Err(SessionError::NotReady { state: self.state.name() });
        }
        let result = self.data_phase.as_mut().expect("DataPhase state implies data_phase is set").read(&mut self.socket);
        if let Err(err) = &result {
            warn!(error = %err, "DataPhase -> Terminated (read failure)");
            self.state = State::Terminated;
        }
        result
    }

    /// Half-closes the socket, sending a Termination block first if the
    /// session had reached the data phase. Cooperative: any read/write
    /// racing against this on another thread observes `Cancelled` once the
    /// socket shuts down.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.state == State::Terminated {
            return Ok(());
        }
        info!(from = self.state.name(), "-> Terminating");
        self.state = State::Terminating;

        if let Some(data_phase) = self.data_phase.as_mut() {
            let _ = data_phase.write(&mut self.socket, &[Block::Termination { reason: 0, data: Vec::new() }]);
        }
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.state = State::Terminated;
        info!("Terminating -> Terminated");
        Ok(())
    }

    pub fn ready(&self) -> bool {
        self.state == State::DataPhase
    }

    pub fn connect_key(&self) -> Option<X25519PublicKey> {
        self.remote_static
    }
}

fn padding_len<R: RngCore>(rng: &mut R, min: u16, max: u16) -> u16 {
    if min >= max {
        return min;
    }
    min + (rng.next_u32() % (max - min + 1) as u32) as u16
}

fn now_unix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_secs() as u32
}

fn write_all(socket: &mut TcpStream, buf: &[u8], op: &'static str) -> Result<(), SessionError> {
    use std::io::Write;
    socket.write_all(buf).map_err(|source| SessionError::SocketError { op, source })
}

fn read_exact_vec(socket: &mut TcpStream, len: usize, op: &'static str) -> Result<Vec<u8>, SessionError> {
    use std::io::Read;
    let mut buf = vec![0u8; len];
    socket
        .read_exact(&mut buf)
        .map_err(|source| SessionError::SocketError { op, source })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;

    use crate::router_info::tests::StaticProvider;

    /// A `Session` stuck in `Uninitialized` — no handshake has run at all.
    /// The socket only needs to exist, not carry any real traffic, since
    /// `write`/`read`/`wait` all reject before touching it.
    fn fresh_uninitialized_session() -> Session {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let socket = TcpStream::connect(addr).unwrap();
        let _ = listener.accept().unwrap();

        Session {
            socket,
            role: Role::Initiator,
            state: State::Uninitialized,
            data_phase: None,
            remote_static: None,
            local_router_info: Arc::new(StaticProvider::new()),
        }
    }

    #[test]
    fn fresh_session_with_no_handshake_rejects_write_and_read_as_not_ready() {
        let mut session = fresh_uninitialized_session();

        let write_err = session.write(&[Block::Padding { bytes: vec![0] }]).unwrap_err();
        assert!(matches!(write_err, SessionError::NotReady { .. }));

        let read_err = session.read().unwrap_err();
        assert!(matches!(read_err, SessionError::NotReady { .. }));

        assert!(!session.ready());
    }

    #[test]
    fn waiting_on_a_session_that_never_reached_data_phase_is_not_ready() {
        let session = fresh_uninitialized_session();
        let err = session.wait().unwrap_err();
        assert!(matches!(err, SessionError::NotReady { .. }));
    }
}

//! Loopback integration tests: a full three-message Noise_XK handshake
//! between two in-process `Session`s, over real `127.0.0.1`/`[::1]`
//! sockets, followed by a data-phase round trip. These are the `session.cc`
//! scenarios spec.md's §8 "Concrete scenarios" enumerates.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use ntcp2::{AddressFamily, Block, Config, RouterInfoProvider, Session, SessionManager};
use ntcp2_crypto::{AesIv, IdentHash, StaticKeyPair, X25519PublicKey};

/// A `RouterInfoProvider` good enough for a loopback test: it has exactly
/// one address in one family, and its "serialized RouterInfo" is just the
/// raw static public key, which `extract_static_pub` parses straight back.
struct TestRouterInfo {
    static_key: StaticKeyPair,
    addr: SocketAddr,
    family: AddressFamily,
}

impl TestRouterInfo {
    fn new(static_key: StaticKeyPair, addr: SocketAddr, family: AddressFamily) -> Self {
        Self { static_key, addr, family }
    }
}

impl RouterInfoProvider for TestRouterInfo {
    fn static_pub(&self) -> X25519PublicKey {
        self.static_key.public()
    }
    fn ident_hash(&self) -> IdentHash {
        IdentHash([0u8; 32])
    }
    fn aes_iv(&self) -> AesIv {
        AesIv([0u8; 16])
    }
    fn addresses(&self, family: AddressFamily) -> Vec<SocketAddr> {
        if family == self.family { vec![self.addr] } else { Vec::new() }
    }
    fn serialized(&self) -> Vec<u8> {
        self.static_key.public().as_bytes().to_vec()
    }
    fn extract_static_pub(&self, serialized: &[u8]) -> Option<X25519PublicKey> {
        if serialized.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(serialized);
        Some(X25519PublicKey::from(bytes))
    }
}

fn free_port(addr: &str) -> SocketAddr {
    TcpListener::bind(format!("{addr}:0")).unwrap().local_addr().unwrap()
}

/// Drives a full initiator/responder handshake over a real loopback socket
/// and returns both ends in `DataPhase`, plus the two static keypairs each
/// side's `connect_key()` should reveal to the other.
fn handshake_over(family: AddressFamily, prefer_v6: bool) -> (Session, Session, StaticKeyPair, StaticKeyPair) {
    let bind_addr = free_port(if family == AddressFamily::V6 { "[::1]" } else { "127.0.0.1" });

    let responder_static = StaticKeyPair::generate(&mut rand::thread_rng());
    let initiator_static = StaticKeyPair::generate(&mut rand::thread_rng());

    let responder_info =
        Arc::new(TestRouterInfo::new(responder_static.clone(), bind_addr, family));
    let initiator_info =
        Arc::new(TestRouterInfo::new(initiator_static.clone(), bind_addr, family));

    let listener = TcpListener::bind(bind_addr).unwrap();
    let config = Config::default();

    let accept_config = config;
    let accept_local_static = responder_static.clone();
    let accept_local_info: Arc<dyn RouterInfoProvider> = responder_info.clone();
    let accept_thread = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        Session::accept(socket, accept_local_info, accept_local_static, &accept_config).unwrap()
    });

    let initiator: Arc<dyn RouterInfoProvider> = initiator_info.clone();
    let remote: Arc<dyn RouterInfoProvider> = responder_info.clone();
    let initiator_session =
        Session::connect(initiator, initiator_static, Some(remote), &config, prefer_v6).unwrap();
    let responder_session = accept_thread.join().unwrap();

    assert!(initiator_session.ready());
    assert!(responder_session.ready());
    (initiator_session, responder_session, initiator_static, responder_static)
}

#[test]
fn ipv4_handshake_completes() {
    let (initiator, responder, initiator_static, responder_static) = handshake_over(AddressFamily::V4, false);
    // Each side's session identity is the *other* side's static public key.
    assert_eq!(initiator.connect_key().unwrap().as_bytes(), responder_static.public().as_bytes());
    assert_eq!(responder.connect_key().unwrap().as_bytes(), initiator_static.public().as_bytes());
}

#[test]
fn ipv6_handshake_completes() {
    let (initiator, responder, _, _) = handshake_over(AddressFamily::V6, true);
    assert!(initiator.ready());
    assert!(responder.ready());
}

#[test]
fn data_phase_round_trip_advances_nonces_each_direction() {
    let (mut initiator, mut responder, _, _) = handshake_over(AddressFamily::V4, false);

    let outbound = vec![Block::Padding { bytes: vec![3, 3, 3] }];
    initiator.write(&outbound).unwrap();
    let received = responder.read().unwrap();
    assert_eq!(received, outbound);

    let reply = vec![Block::DateTime { unix_time: 1_700_000_000 }];
    responder.write(&reply).unwrap();
    let received_reply = initiator.read().unwrap();
    assert_eq!(received_reply, reply);
}

#[test]
fn duplicate_outbound_session_is_rejected() {
    let bind_addr = free_port("127.0.0.1");
    let responder_static = StaticKeyPair::generate(&mut rand::thread_rng());
    let initiator_static = StaticKeyPair::generate(&mut rand::thread_rng());
    let responder_info: Arc<dyn RouterInfoProvider> =
        Arc::new(TestRouterInfo::new(responder_static.clone(), bind_addr, AddressFamily::V4));
    let initiator_info: Arc<dyn RouterInfoProvider> =
        Arc::new(TestRouterInfo::new(initiator_static.clone(), bind_addr, AddressFamily::V4));

    let listener = TcpListener::bind(bind_addr).unwrap();
    let manager = Arc::new(SessionManager::new(initiator_static, initiator_info, Config::default()));

    let accept_responder_static = responder_static.clone();
    let accept_responder_info: Arc<dyn RouterInfoProvider> = responder_info.clone();
    let accept_thread = thread::spawn(move || {
        // Two inbound accepts: one for each outbound attempt below.
        let (first, _) = listener.accept().unwrap();
        let _ = Session::accept(first, accept_responder_info, accept_responder_static, &Config::default());
    });

    let first = manager.connect(Some(responder_info.clone()), false);
    accept_thread.join().unwrap();
    assert!(first.is_ok());

    let second = manager.connect(Some(responder_info), false);
    assert!(matches!(second, Err(ntcp2::SessionError::DuplicateSession)));
}

#[test]
fn connecting_to_an_unreachable_peer_never_produces_a_session() {
    // `Session::connect`/`Session::accept` drive the handshake to
    // completion (or a fatal error) before returning: there is no public
    // constructor that hands back a pre-`DataPhase` `Session` for a caller
    // to call `Write`/`Read` on. The `NotReady` rejection for a *live*
    // session past the data phase is covered by
    // `peer_disappearing_mid_data_phase_terminates_the_session` below; this
    // test covers the other half — a handshake that never gets to run at
    // all fails the same way, with no `Session` value ever escaping.
    let unreachable = free_port("127.0.0.1");
    let responder_static = StaticKeyPair::generate(&mut rand::thread_rng());
    let initiator_static = StaticKeyPair::generate(&mut rand::thread_rng());
    let remote: Arc<dyn RouterInfoProvider> =
        Arc::new(TestRouterInfo::new(responder_static, unreachable, AddressFamily::V4));
    let local: Arc<dyn RouterInfoProvider> =
        Arc::new(TestRouterInfo::new(initiator_static.clone(), unreachable, AddressFamily::V4));

    let result = Session::connect(local, initiator_static, Some(remote), &Config::default(), false);
    assert!(result.is_err());
}

#[test]
fn null_router_info_is_rejected() {
    let initiator_static = StaticKeyPair::generate(&mut rand::thread_rng());
    let local: Arc<dyn RouterInfoProvider> =
        Arc::new(TestRouterInfo::new(initiator_static.clone(), free_port("127.0.0.1"), AddressFamily::V4));

    let err = Session::connect(local, initiator_static, None, &Config::default(), false).unwrap_err();
    assert!(matches!(err, ntcp2::SessionError::InvalidArgument(_)));
}

#[test]
fn peer_disappearing_mid_data_phase_terminates_the_session() {
    // `DataPhase::read`/`write`'s tampered-ciphertext path is exercised at
    // the unit level in `ntcp2_session::data_phase` (it needs to flip a
    // wire byte, which the public `Session` API has no seam for). What the
    // `Session` wrapper itself owns is the state transition: any fatal
    // data-phase fault — AEAD failure or a dead socket alike — moves it to
    // `Terminated` and makes every later `Write`/`Read` fail with
    // `NotReady` rather than re-attempting I/O on a dead connection.
    let (mut initiator, mut responder, _, _) = handshake_over(AddressFamily::V4, false);

    drop(initiator);
    let first_read_after_peer_gone = responder.read();
    assert!(first_read_after_peer_gone.is_err());

    let second_read = responder.read();
    assert!(matches!(second_read, Err(ntcp2::SessionError::NotReady { .. })));
}
